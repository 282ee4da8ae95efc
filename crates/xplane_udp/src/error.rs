//! # Error Types
//!
//! All errors that can occur while talking to the simulator.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur in the client.
#[derive(Error, Debug)]
pub enum XPlaneError {
    /// No beacon arrived before the discovery deadline.
    #[error("could not find any running X-Plane instance on the network")]
    EndpointNotFound,

    /// A beacon was decoded but announces an unsupported protocol version.
    #[error("X-Plane beacon version not supported: {main}.{minor} (software {software})")]
    VersionNotSupported {
        /// Major beacon version.
        main: u8,
        /// Minor beacon version.
        minor: u8,
        /// Application id (1 = X-Plane, 2 = PlaneMaker).
        software: i32,
    },

    /// A bounded receive produced nothing before its deadline.
    #[error("X-Plane timeout")]
    Timeout,

    /// A field would be read or written past the end of a buffer.
    #[error("buffer bounds exceeded: {len} bytes at offset {offset}, capacity {capacity}")]
    BufferBounds {
        /// Offset of the field.
        offset: usize,
        /// Width of the field.
        len: usize,
        /// Size of the buffer.
        capacity: usize,
    },

    /// Traffic on the beacon port that is not a beacon.
    #[error("unknown packet of {len} bytes from {from} on the beacon port")]
    UnknownBeacon {
        /// Sender of the datagram.
        from: SocketAddr,
        /// Length of the datagram.
        len: usize,
    },

    /// The client has already been closed.
    #[error("client is closed")]
    Closed,

    /// A blocking client call was made from a tokio runtime thread.
    #[error("the client must be created outside of an async runtime")]
    AsyncContext,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Socket level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl XPlaneError {
    /// Returns true for errors that abort client construction.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EndpointNotFound
                | Self::VersionNotSupported { .. }
                | Self::AsyncContext
                | Self::Io(_)
                | Self::Config(_)
        )
    }
}

/// Result type for client operations.
pub type XPlaneResult<T> = Result<T, XPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(XPlaneError::EndpointNotFound.is_fatal());
        assert!(XPlaneError::VersionNotSupported { main: 2, minor: 0, software: 1 }.is_fatal());
        assert!(XPlaneError::AsyncContext.is_fatal());
        assert!(!XPlaneError::Timeout.is_fatal());
        assert!(!XPlaneError::BufferBounds { offset: 0, len: 4, capacity: 2 }.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = XPlaneError::BufferBounds { offset: 8, len: 4, capacity: 10 };
        assert_eq!(err.to_string(), "buffer bounds exceeded: 4 bytes at offset 8, capacity 10");
    }
}
