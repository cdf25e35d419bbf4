pub mod commands;
pub mod core;
pub mod logging;
pub mod shared;

pub use crate::core::catalog::{UnitCatalog, UnitCategory};
pub use crate::core::session::ConverterSession;
pub use crate::shared::error::{AppError, AppResult};
