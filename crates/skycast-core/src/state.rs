//! State that must survive deep sleep.

use log::warn;

/// The two fields carried across wake cycles in non-volatile storage.
///
/// `low_battery_latched` makes the low-battery warning a one-shot: set on the
/// first degraded cycle, cleared on the first recovered one.
/// `consecutive_errors` only ever counts up during failing cycles and resets
/// to zero in one step when a cycle completes a full render.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PersistentState {
    pub low_battery_latched: bool,
    pub consecutive_errors: u32,
}

/// Abstract non-volatile backend. `load` returning `Ok(None)` means a blank
/// or unrecognized record; both map to first-boot defaults.
pub trait StateStore {
    type Error;

    fn load(&mut self) -> Result<Option<PersistentState>, Self::Error>;
    fn save(&mut self, state: &PersistentState) -> Result<(), Self::Error>;
}

/// Read the persisted state, treating corruption the same as first boot.
/// A store that cannot be read must never block scheduling.
pub fn load_or_default<S>(store: &mut S) -> PersistentState
where
    S: StateStore,
    S::Error: core::fmt::Debug,
{
    match store.load() {
        Ok(Some(state)) => state,
        Ok(None) => PersistentState::default(),
        Err(err) => {
            warn!("state store unreadable, using first-boot defaults: {:?}", err);
            PersistentState::default()
        }
    }
}

/// In-memory store for tests and bring-up.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryStateStore {
    stored: Option<PersistentState>,
}

impl MemoryStateStore {
    pub const fn new() -> Self {
        Self { stored: None }
    }
}

impl StateStore for MemoryStateStore {
    type Error = core::convert::Infallible;

    fn load(&mut self) -> Result<Option<PersistentState>, Self::Error> {
        Ok(self.stored)
    }

    fn save(&mut self, state: &PersistentState) -> Result<(), Self::Error> {
        self.stored = Some(*state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl StateStore for BrokenStore {
        type Error = &'static str;

        fn load(&mut self) -> Result<Option<PersistentState>, Self::Error> {
            Err("checksum mismatch")
        }

        fn save(&mut self, _state: &PersistentState) -> Result<(), Self::Error> {
            Err("write failed")
        }
    }

    #[test]
    fn blank_store_yields_first_boot_defaults() {
        let mut store = MemoryStateStore::new();
        assert_eq!(load_or_default(&mut store), PersistentState::default());
    }

    #[test]
    fn corrupt_store_yields_first_boot_defaults() {
        assert_eq!(load_or_default(&mut BrokenStore), PersistentState::default());
    }

    #[test]
    fn saved_state_round_trips() {
        let mut store = MemoryStateStore::new();
        let state = PersistentState {
            low_battery_latched: true,
            consecutive_errors: 2,
        };
        store.save(&state).unwrap();
        assert_eq!(load_or_default(&mut store), state);
    }
}
