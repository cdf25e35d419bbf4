//! Conversion features
//!
//! - `unit_converter`: table-driven conversions over the unit catalog
//! - `ai_converter`: free-text conversions interpreted by a hosted model

pub mod unit_converter;
pub mod ai_converter;
