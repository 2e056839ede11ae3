//! gb-core: shared foundation for growbox.
//!
//! Contains:
//! - types (sensor reports, simulated environment, actuator commands)
//! - numeric (Real + finiteness and level helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod types;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use types::*;
