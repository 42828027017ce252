//! # Quant
//!
//! Portfolio construction and market-data access.

pub mod portfolio;
#[cfg(feature = "yahoo")]
pub mod yahoo;
