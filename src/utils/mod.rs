//! Utilities module
//!
//! Contains error handling, console reporting, text generators, pricing
//! arithmetic and gateway log inspection

pub mod console;
pub mod error;
pub mod gateway_logs;
pub mod logging;
pub mod pricing;
pub mod text;
