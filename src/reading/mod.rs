//! Readers for the two pipeline inputs.

pub mod outage;
pub mod registry;
