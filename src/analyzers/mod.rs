//! Occupancy estimation for one route.
//!
//! Samples of a day are split into trips, seat readings become passenger
//! counts, gaps are filled from neighbouring stops, and per-stop changes are
//! derived. Days can then be averaged by trip slot.

pub mod aggregate;
pub mod analyzer;
pub mod changes;
pub mod error;
pub mod estimate;
pub mod fill;
pub mod segment;
pub mod types;
pub mod utility;
