//! Error types for chip loading, connectivity resolution and generation.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for interconnect operations.
pub type InterconnectResult<T> = Result<T, InterconnectError>;

/// Errors that can occur while loading a chip or generating a circuit.
#[derive(Debug, Error)]
pub enum InterconnectError {
    /// Failed to open or read a file.
    #[error("Failed to read file: {path}")]
    FileRead {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file: {path}")]
    FileWrite {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The chip description is not a record list.
    #[error("Malformed chip description: {message}")]
    MalformedChip {
        /// Description of what's wrong.
        message: String,
    },

    /// A hint was looked up that was never part of the base chip.
    #[error("Unresolved hint: {hint}")]
    UnresolvedHint {
        /// The hint that could not be resolved.
        hint: String,
    },

    /// A user connection references a pin the chip does not expose.
    #[error("Connection '{connection_id}' references unknown pin '{pin}'")]
    UnknownPin {
        /// Connection identifier.
        connection_id: String,
        /// Display name that could not be resolved.
        pin: String,
    },

    /// A chip pad has no hint known to the resolver.
    #[error("Pad '{pad_id}' has no resolvable hint (hints: {hints:?})")]
    UnresolvedPad {
        /// Pad identifier from the chip description.
        pad_id: String,
        /// Hints carried by the pad.
        hints: Vec<String>,
    },

    /// A connection would mix `C` and `X` pins.
    #[error("Connection '{connection_id}' cannot mix pin '{pin}' with pins of another kind")]
    MixedPinKinds {
        /// Connection identifier.
        connection_id: String,
        /// Pin that was rejected.
        pin: String,
    },

    /// A connection would hold more than one diagonal `X` pair.
    #[error("Connection '{connection_id}' already holds a diagonal pair; cannot add '{pin}'")]
    MultipleDiagonalPairs {
        /// Connection identifier.
        connection_id: String,
        /// Pin that was rejected.
        pin: String,
    },

    /// A pin is already a member of some connection.
    #[error("Pin '{pin}' is already part of connection '{connection_id}'")]
    PinAlreadyConnected {
        /// Connection that owns the pin.
        connection_id: String,
        /// Pin that was rejected.
        pin: String,
    },

    /// No connection with the given id exists.
    #[error("Connection not found: {id}")]
    UnknownConnection {
        /// Connection identifier.
        id: String,
    },

    /// A connection with the given id already exists.
    #[error("Connection already exists: {id}")]
    DuplicateConnection {
        /// Connection identifier.
        id: String,
    },
}

impl InterconnectError {
    /// Creates a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed chip error.
    pub fn malformed_chip(message: impl Into<String>) -> Self {
        Self::MalformedChip {
            message: message.into(),
        }
    }

    /// Creates an unresolved hint error.
    pub fn unresolved_hint(hint: impl Into<String>) -> Self {
        Self::UnresolvedHint { hint: hint.into() }
    }

    /// Creates an unknown pin error.
    pub fn unknown_pin(connection_id: impl Into<String>, pin: impl Into<String>) -> Self {
        Self::UnknownPin {
            connection_id: connection_id.into(),
            pin: pin.into(),
        }
    }

    /// Creates an unknown connection error.
    pub fn unknown_connection(id: impl Into<String>) -> Self {
        Self::UnknownConnection { id: id.into() }
    }
}
