//! Crate-wide error type.
//!
//! Every fallible kernel operation returns [`Result<T>`]. [`ErrorKind`]
//! maps 1:1 onto the ABI's negative `i64` return codes (spec.md §6) so the
//! module boundary can translate an internal error into a wire code with
//! a single call to [`ErrorKind::to_abi_code`].

use std::fmt;

/// The kernel's error kind, matching the table in spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Outbound event on an ungranted capability, or a `map` request for
    /// permissions exceeding the reference's grant.
    Perm,
    /// Channel destroyed, blob missing, or kv key absent on `get`.
    NotFound,
    /// Channel full, or a physical I/O failure during flush.
    Io,
    /// Quota exceeded, or DMA unavailable when required.
    Oom,
    /// Malformed value, bad URI, or bad arguments.
    Invalid,
    /// Compute or wall-time budget exceeded.
    Timeout,
    /// Schema mismatch at a channel boundary or in a payload.
    Type,
}

impl ErrorKind {
    /// The ABI `i64` code for this kind (spec.md §6).
    #[must_use]
    pub const fn to_abi_code(self) -> i64 {
        match self {
            Self::Perm => -1,
            Self::NotFound => -2,
            Self::Io => -3,
            Self::Oom => -4,
            Self::Invalid => -5,
            Self::Timeout => -6,
            Self::Type => -7,
        }
    }

    /// Recovers a kind from an ABI code, if it names one of the seven
    /// defined error codes.
    #[must_use]
    pub const fn from_abi_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Perm),
            -2 => Some(Self::NotFound),
            -3 => Some(Self::Io),
            -4 => Some(Self::Oom),
            -5 => Some(Self::Invalid),
            -6 => Some(Self::Timeout),
            -7 => Some(Self::Type),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Perm => "permission denied",
            Self::NotFound => "not found",
            Self::Io => "i/o error",
            Self::Oom => "out of memory",
            Self::Invalid => "invalid argument",
            Self::Timeout => "timeout",
            Self::Type => "type mismatch",
        };
        f.write_str(s)
    }
}

/// The kernel's error type: a kind plus a human-readable context message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    /// The structured kind, convertible to an ABI code.
    pub kind: ErrorKind,
    /// Contextual message for logs and test assertions.
    pub message: String,
}

impl Error {
    /// Builds a new error of the given kind with a context message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand constructors, one per [`ErrorKind`] variant.
    pub fn perm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Perm, message)
    }

    /// See [`Error::perm`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// See [`Error::perm`].
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// See [`Error::perm`].
    pub fn oom(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Oom, message)
    }

    /// See [`Error::perm`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    /// See [`Error::perm`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// See [`Error::perm`].
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// The ABI code for this error.
    #[must_use]
    pub const fn to_abi_code(&self) -> i64 {
        self.kind.to_abi_code()
    }
}

/// The kernel's result alias.
pub type Result<T> = std::result::Result<T, Error>;
