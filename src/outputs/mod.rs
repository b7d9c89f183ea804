//! Writing run results.
//!
//! - [`json`]: a [`crate::models::BatchOutcome`] (or any serializable value)
//!   as pretty JSON, to stdout or a file

pub mod json;
