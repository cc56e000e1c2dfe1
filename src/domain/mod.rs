//! Domain records and enumerations.

pub mod entities;
pub mod types;
