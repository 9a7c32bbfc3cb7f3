//! Application-level error reporting shared by the binary and HTTP layer.

pub mod error;
