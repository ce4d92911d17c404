//! Error types for lease lookups.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants.
//!
//! The variants fall into three groups:
//!
//! - Domain outcomes ([`Error::NoLeaseFound`], [`Error::DuplicateLeaseFound`])
//!   mean the request cannot be answered safely and should be dropped.
//! - Configuration failures ([`Error::MissingConfiguration`],
//!   [`Error::InvalidArgumentCount`], [`Error::InvalidUrl`],
//!   [`Error::InvalidConfig`]) are fatal at
//!   startup.
//! - Infrastructure failures (transport, remote status, decoding, deadline)
//!   are passed through untouched so they are never mistaken for "no lease".

use std::time::Duration;

/// Errors that can occur while resolving a lease.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No candidate record matched, or the single candidate holds no lease
    /// with exactly this MAC address.
    #[error("no dhcp lease found for MAC address {mac}")]
    NoLeaseFound { mac: String },

    /// More than one inventory record matched the MAC pre-filter.
    ///
    /// Points at a data hygiene problem upstream; the request is dropped
    /// rather than answered with an arbitrary pick.
    #[error("multiple dhcp leases found for MAC address {mac} ({count} records)")]
    DuplicateLeaseFound { mac: String, count: usize },

    /// A required configuration value is absent (names the variable).
    #[error("expected {0} to be set")]
    MissingConfiguration(&'static str),

    /// The plugin was configured with the wrong number of arguments.
    #[error("got {got} arguments, want 1")]
    InvalidArgumentCount { got: usize },

    /// The inventory base URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network or protocol failure talking to a remote endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The inventory service answered with a non-success status.
    #[error("inventory service returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The token endpoint refused to issue an access token.
    #[error("token endpoint returned {status}: {message}")]
    Token { status: u16, message: String },

    /// JSON decoding of a response envelope or lease payload failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration value present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A resolved lease carries a value that cannot be put on the wire.
    #[error("invalid lease: {0}")]
    InvalidLease(String),

    /// Malformed DHCP packet.
    #[error("Invalid DHCP packet: {0}")]
    InvalidPacket(String),

    /// The lookup did not finish within the caller's deadline.
    #[error("lease lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Returns true for outcomes that mean "do not answer this request"
    /// without indicating an infrastructure failure.
    pub fn is_unanswerable(&self) -> bool {
        matches!(
            self,
            Self::NoLeaseFound { .. } | Self::DuplicateLeaseFound { .. }
        )
    }
}

/// A specialized Result type for lease lookups.
pub type Result<T> = std::result::Result<T, Error>;
