//! Non-volatile storage backends.

mod flash_state;

pub use flash_state::{FlashStateError, FlashStateStore};
