//! # kula_core - Kula Engine Core
//!
//! Foundational pieces shared by every other crate:
//! - **Errors**: the data-model error taxonomy
//! - **Clock**: monotonic game time sampled once per frame

pub mod clock;
pub mod error;

pub use clock::*;
pub use error::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{GameClock, GameTime};
    pub use crate::error::{Error, ErrorKind, Result};
}
