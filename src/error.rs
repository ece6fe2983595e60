// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the resource manager and its mapping onto wire
// status codes. Protocol errors are small and enumerable; transport
// failures stay `io::Error` underneath.

use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between a decoded message and its ack.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown manager name or unknown resource id.
    #[error("not found")]
    NotFound,

    /// Bad resource index, bad argument size, or out-of-range value.
    #[error("invalid argument")]
    InvalidArgument,

    /// Message too short for its declared headers.
    #[error("malformed message")]
    Malformed,

    /// Duplicate registration of a resource or manager name.
    #[error("already exists")]
    AlreadyExists,

    /// Unregistration attempted while references remain.
    #[error("busy")]
    Busy,

    /// The resource provides no implementation for the operation.
    #[error("unsupported operation")]
    Unsupported,

    /// Allocation failure (no free instances left to grant).
    #[error("resource exhausted")]
    ResourceExhausted,

    /// Message delivered to a session that already began teardown.
    #[error("session closed")]
    Closed,

    /// Driver-specific failure, surfaced verbatim as a negative status.
    #[error("driver error {0}")]
    Driver(i32),

    /// Transport send failure.
    #[error("channel i/o: {0}")]
    Io(#[from] io::Error),
}

// Wire status codes (negative on error, 0 on success). The remote side
// predates this implementation, so the numbering is fixed.
pub(crate) const STATUS_OK: i32 = 0;
const STATUS_NOT_FOUND: i32 = -2;
const STATUS_IO: i32 = -5;
const STATUS_EXHAUSTED: i32 = -12;
const STATUS_BUSY: i32 = -16;
const STATUS_EXISTS: i32 = -17;
const STATUS_INVALID: i32 = -22;
const STATUS_UNSUPPORTED: i32 = -38;
const STATUS_CLOSED: i32 = -108;

impl Error {
    /// The status value placed in an ack for this error.
    ///
    /// `Driver` statuses pass through verbatim so the remote endpoint
    /// sees exactly what the hardware layer reported.
    pub fn to_status(&self) -> i32 {
        match self {
            Error::NotFound => STATUS_NOT_FOUND,
            Error::InvalidArgument | Error::Malformed => STATUS_INVALID,
            Error::AlreadyExists => STATUS_EXISTS,
            Error::Busy => STATUS_BUSY,
            Error::Unsupported => STATUS_UNSUPPORTED,
            Error::ResourceExhausted => STATUS_EXHAUSTED,
            Error::Closed => STATUS_CLOSED,
            Error::Driver(s) => *s,
            Error::Io(_) => STATUS_IO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_status_passes_through() {
        assert_eq!(Error::Driver(-77).to_status(), -77);
    }

    #[test]
    fn malformed_and_invalid_share_a_status() {
        assert_eq!(Error::Malformed.to_status(), Error::InvalidArgument.to_status());
    }

    #[test]
    fn statuses_are_negative() {
        let all = [
            Error::NotFound,
            Error::InvalidArgument,
            Error::Malformed,
            Error::AlreadyExists,
            Error::Busy,
            Error::Unsupported,
            Error::ResourceExhausted,
            Error::Closed,
        ];
        for e in all {
            assert!(e.to_status() < 0, "{e} must map to a negative status");
        }
    }
}
