//! Single-flight flag with owner tokens.
//!
//! Acquiring returns a guard; dropping the guard releases the flag, on
//! success, failure, or an early return alike. Release is conditional on the
//! guard still owning the flag, so after a `force_release` (explicit logout)
//! a late guard cannot clear a newer holder's flag.

#[cfg(test)]
#[path = "single_flight_test.rs"]
mod single_flight_test;

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct SingleFlight {
    owner: Cell<Option<u64>>,
    next_token: Cell<u64>,
}

impl SingleFlight {
    /// `None` while another holder is in flight.
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        if self.owner.get().is_some() {
            return None;
        }
        let token = self.next_token.get().wrapping_add(1);
        self.next_token.set(token);
        self.owner.set(Some(token));
        Some(FlightGuard { flight: self, token })
    }

    pub fn is_held(&self) -> bool {
        self.owner.get().is_some()
    }

    pub fn force_release(&self) {
        self.owner.set(None);
    }
}

#[must_use = "the flight is released as soon as the guard is dropped"]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
    token: u64,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.flight.owner.get() == Some(self.token) {
            self.flight.owner.set(None);
        }
    }
}
