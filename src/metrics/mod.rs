//! Deterministic metrics computation.
//!
//! `aggregate` turns raw report rows into entity-level metrics;
//! `assembler` runs every aggregation, slices the results, and produces the
//! validated metrics bundle consumed by the insights stage.

pub mod aggregate;
pub mod assembler;
