//! Logging for the completion protocol.
//!
//! Swallowed failures are reported through an injected [`CompletionLogger`]
//! rather than a process-wide logger. Lifecycle chatter goes straight to
//! `tracing`.

mod init;
mod sink;

pub use init::{init_logging, LogFormat};
pub use sink::{
    CollectingCompletionLogger, CompletionLogger, NoOpCompletionLogger, TracingCompletionLogger,
};
