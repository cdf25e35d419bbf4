//! Conversion core: catalog, engine, history and the session tying them together

pub mod catalog;
pub mod features;
pub mod history;
pub mod session;
