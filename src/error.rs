use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuiverError>;

#[derive(Debug, Error)]
pub enum QuiverError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corruption detected: {0}")]
    Corruption(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error("bootstrap failure: {0}")]
    Bootstrap(String),
}

/// Aborts on a contract violation.
///
/// The first argument names the detecting component; the rest is a normal
/// format string carrying the offending identifiers and the expectation that
/// was broken. The diagnostic goes through `tracing` before the panic so it
/// reaches structured log sinks as well as the panic message.
macro_rules! fatal {
    ($component:expr, $($arg:tt)+) => {{
        let detail = format!($($arg)+);
        tracing::error!(component = $component, "{detail}");
        panic!("{}: {detail}", $component);
    }};
}

pub(crate) use fatal;
