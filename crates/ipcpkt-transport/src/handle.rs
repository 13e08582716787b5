//! Lifecycle bookkeeping for transport handles.

use std::fmt;

use crate::error::{Result, TransportError};

/// Observable lifecycle state of a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Never created or opened.
    Unopened,
    /// Owns live OS resources.
    Open,
    /// Resources released; the handle cannot be reused.
    Closed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleState::Unopened => f.write_str("unopened"),
            HandleState::Open => f.write_str("open"),
            HandleState::Closed => f.write_str("closed"),
        }
    }
}

/// Holder for the OS resources of one handle.
///
/// Resources live only in `Open`; leaving `Open` drops them exactly once.
pub(crate) enum Slot<T> {
    Unopened,
    Open(T),
    Closed,
}

impl<T> Slot<T> {
    pub(crate) fn state(&self) -> HandleState {
        match self {
            Slot::Unopened => HandleState::Unopened,
            Slot::Open(_) => HandleState::Open,
            Slot::Closed => HandleState::Closed,
        }
    }

    pub(crate) fn get(&self) -> Result<&T> {
        match self {
            Slot::Open(inner) => Ok(inner),
            _ => Err(TransportError::NotOpen),
        }
    }

    pub(crate) fn get_mut(&mut self) -> Result<&mut T> {
        match self {
            Slot::Open(inner) => Ok(inner),
            _ => Err(TransportError::NotOpen),
        }
    }

    /// Take the resources out, leaving the slot closed.
    ///
    /// Returns `None` when nothing was open. An unopened slot still ends up
    /// closed.
    pub(crate) fn close(&mut self) -> Option<T> {
        match std::mem::replace(self, Slot::Closed) {
            Slot::Open(inner) => Some(inner),
            Slot::Unopened | Slot::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_releases_once() {
        let mut slot = Slot::Open(5u8);
        assert_eq!(slot.state(), HandleState::Open);
        assert_eq!(slot.close(), Some(5));
        assert_eq!(slot.close(), None);
        assert_eq!(slot.state(), HandleState::Closed);
    }

    #[test]
    fn unopened_slot_closes_cleanly() {
        let mut slot: Slot<u8> = Slot::Unopened;
        assert!(matches!(slot.get(), Err(TransportError::NotOpen)));
        assert_eq!(slot.close(), None);
        assert_eq!(slot.state(), HandleState::Closed);
        assert!(matches!(slot.get_mut(), Err(TransportError::NotOpen)));
    }
}
