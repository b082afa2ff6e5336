//! Process-wide logging setup for the binary.
//!
//! Library crates never install a subscriber; each component logs inside
//! the span it was given. The binary decides where those spans go.

mod logging;

pub use logging::{init_logging, LogFormat};
