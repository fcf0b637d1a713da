//! Agency Platform common runtime helpers.

pub mod logging;

pub use logging::{init_logging, LogFormat};
