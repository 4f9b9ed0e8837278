// Job storage on the local filesystem

pub mod workspace;

pub use workspace::*;
