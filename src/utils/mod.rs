// Utility functions

pub mod logger;
pub mod sanitize;

pub use logger::*;
pub use sanitize::*;
