//! Relay contact with NO/NC polarity
//!
//! The contact is "open" or "closed" from the user's point of view. How
//! that maps to the relay coil depends on whether the load is wired to the
//! normally-open or normally-closed terminal: with NO wiring an energised
//! coil closes the contact, with NC wiring it opens it.
//!
//! The open/closed state is never stored. It is derived from the level the
//! relay pin was last driven to, so it stays correct when the wiring is
//! changed underneath it.

use cyclo_hal::OutputPin;

use crate::state::{Event, EventSink};

/// Which relay terminal the load is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wiring {
    /// Normally open: contact is open while the coil is de-energised
    #[default]
    No,
    /// Normally closed: contact is closed while the coil is de-energised
    Nc,
}

/// Requested contact state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContactState {
    /// No intent: the relay keeps whatever level it has
    #[default]
    LeaveAsIs,
    Open,
    Close,
}

/// A relay contact driven through an output pin
pub struct Contact<P> {
    relay: P,
    wiring: Wiring,
    logical: ContactState,
}

impl<P: OutputPin> Contact<P> {
    /// Wrap a relay pin. The pin is not driven until the first `set`.
    pub fn new(relay: P) -> Self {
        Self {
            relay,
            wiring: Wiring::No,
            logical: ContactState::LeaveAsIs,
        }
    }

    pub fn is_no(&self) -> bool {
        self.wiring == Wiring::No
    }

    pub fn wiring(&self) -> Wiring {
        self.wiring
    }

    /// Last requested state
    pub fn state(&self) -> ContactState {
        self.logical
    }

    /// Whether the contact is open, given the coil level and the wiring
    pub fn is_open(&self) -> bool {
        self.is_no() != self.relay.is_set_high()
    }

    /// Drive the contact
    ///
    /// `LeaveAsIs` only records the intent and does not touch the pin.
    /// Publishes [`Event::ContactUpdate`] if the requested state differs
    /// from the previous request.
    pub fn set(&mut self, state: ContactState, events: &impl EventSink) {
        let previous = self.logical;
        self.logical = state;

        match state {
            ContactState::Open => self.relay.set_state(!self.is_no()),
            ContactState::Close => self.relay.set_state(self.is_no()),
            ContactState::LeaveAsIs => {}
        }

        if previous != state {
            events.publish(Event::ContactUpdate);
        }
    }

    /// Toggle the contact, then drop the intent
    ///
    /// Dropping the intent keeps a later wiring change from re-driving the
    /// relay to the state chosen here.
    pub fn flip(&mut self, events: &impl EventSink) {
        let target = if self.is_open() {
            ContactState::Close
        } else {
            ContactState::Open
        };
        self.set(target, events);
        self.unmanage();
    }

    /// Forget the requested state without touching the relay
    pub fn unmanage(&mut self) {
        self.logical = ContactState::LeaveAsIs;
    }

    /// Apply a (debounced) wiring change
    ///
    /// The requested state is re-applied under the new polarity.
    /// [`Event::ContactUpdate`] is published only if the derived open/closed
    /// state changed; [`Event::NoNcUpdate`] is always published.
    pub fn set_as_no(&mut self, is_no: bool, events: &impl EventSink) {
        let was_open = self.is_open();

        self.wiring = if is_no { Wiring::No } else { Wiring::Nc };
        let logical = self.logical;
        self.set(logical, events);

        if was_open != self.is_open() {
            events.publish(Event::ContactUpdate);
        }
        events.publish(Event::NoNcUpdate);
    }

    /// Access the relay pin
    pub fn relay(&self) -> &P {
        &self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPin, RecordingSink};

    #[test]
    fn test_new_contact_is_open_and_untouched() {
        let contact = Contact::new(MockPin::new());
        assert!(contact.is_no());
        assert!(contact.is_open());
        assert_eq!(contact.state(), ContactState::LeaveAsIs);
        assert_eq!(contact.relay().writes, 0);
    }

    #[test]
    fn test_polarity_mapping() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());

        contact.set(ContactState::Close, &sink);
        assert!(contact.relay().is_set_high());
        assert!(!contact.is_open());

        contact.set_as_no(false, &sink);
        contact.set(ContactState::Close, &sink);
        assert!(contact.relay().is_set_low());
        assert!(!contact.is_open());

        contact.set(ContactState::Open, &sink);
        assert!(contact.relay().is_set_high());
        assert!(contact.is_open());
    }

    #[test]
    fn test_set_notifies_only_on_change() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());

        contact.set(ContactState::Close, &sink);
        contact.set(ContactState::Close, &sink);
        assert_eq!(sink.count(Event::ContactUpdate), 1);

        contact.set(ContactState::Open, &sink);
        assert_eq!(sink.count(Event::ContactUpdate), 2);
    }

    #[test]
    fn test_leave_as_is_keeps_pin() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());

        contact.set(ContactState::Close, &sink);
        let writes = contact.relay().writes;
        contact.set(ContactState::LeaveAsIs, &sink);

        assert_eq!(contact.relay().writes, writes);
        assert!(!contact.is_open());
    }

    #[test]
    fn test_flip_toggles_once_then_wiring_refresh_is_quiet() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());
        assert!(contact.is_open());

        contact.flip(&sink);
        assert!(!contact.is_open());
        assert_eq!(contact.state(), ContactState::LeaveAsIs);
        assert_eq!(sink.count(Event::ContactUpdate), 1);

        // Same wiring reported again by the sampler
        contact.set_as_no(true, &sink);
        assert!(!contact.is_open());
        assert_eq!(sink.count(Event::ContactUpdate), 1);
        assert_eq!(sink.count(Event::NoNcUpdate), 1);

        contact.flip(&sink);
        assert!(contact.is_open());
        assert_eq!(sink.count(Event::ContactUpdate), 2);
    }

    #[test]
    fn test_wiring_change_with_intent_keeps_contact_state() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());
        contact.set(ContactState::Open, &sink);
        sink.take();

        contact.set_as_no(false, &sink);
        assert!(contact.is_open());
        assert!(contact.relay().is_set_high());
        assert_eq!(sink.count(Event::ContactUpdate), 0);
        assert_eq!(sink.count(Event::NoNcUpdate), 1);
    }

    #[test]
    fn test_wiring_change_without_intent_flips_contact_state() {
        let sink = RecordingSink::new();
        let mut contact = Contact::new(MockPin::new());
        contact.flip(&sink);
        sink.take();

        contact.set_as_no(false, &sink);
        assert!(contact.is_open());
        assert_eq!(sink.count(Event::ContactUpdate), 1);
        assert_eq!(contact.wiring(), Wiring::Nc);
    }
}
