//! pn-core: foundation shared by every porenet crate.
//!
//! Contains:
//! - ids (compact element, node, pore and cluster ids)
//! - numeric (sentinels and bound checks)
//! - units (uom types for unit-carrying inputs)
//! - error (shared error type)
//! - timing (opt-in profiling counters)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod timing;
pub mod units;

pub use error::{PnError, PnResult};
pub use ids::*;
pub use numeric::*;
