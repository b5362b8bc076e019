//! Listener errors.

use thiserror::Error;

/// Failure to bring the listener up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Other socket error.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_display_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:1"));
        assert!(msg.contains("in use"));
    }
}
