//! Core types shared by the IGA crates: errors, tolerances, identifiers.

pub mod error;
pub mod id;
pub mod tolerance;
pub mod traits;

pub use error::{check_range, IgaError, Result};
pub use id::EntityId;
pub use tolerance::Tolerance;
