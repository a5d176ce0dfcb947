//! Error types and the numeric error-code registry shared with the CMS.
//!
//! The CMS reports publish and ingest failures by numeric code. The codes owned
//! by this pack are listed in [`ErrorCode`]; `describe` maps a code back to its
//! human readable description.

use thiserror::Error;

use crate::contract::BoxError;

/// Every error code registered by this pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ZczcParser = 1100,
    NewsBitesParser = 1101,
    PdaResultsParser = 1102,
    AsiaNetParser = 1103,
    HttpPush = 14000,
    SocketConnection = 15101,
    SocketSend = 15102,
    AppleNewsFormat = 50000,
    AppleNewsPublish = 50001,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::ZczcParser,
        ErrorCode::NewsBitesParser,
        ErrorCode::PdaResultsParser,
        ErrorCode::AsiaNetParser,
        ErrorCode::HttpPush,
        ErrorCode::SocketConnection,
        ErrorCode::SocketSend,
        ErrorCode::AppleNewsFormat,
        ErrorCode::AppleNewsPublish,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::ZczcParser => "ZCZC input could not be processed",
            ErrorCode::NewsBitesParser => "News Bites input could not be processed",
            ErrorCode::PdaResultsParser => "PDA Results input could not be processed",
            ErrorCode::AsiaNetParser => "AsiaNet input could not be processed",
            ErrorCode::HttpPush => "HTTP push publish error",
            ErrorCode::SocketConnection => "Socket publish connection error",
            ErrorCode::SocketSend => "Socket publish send error",
            ErrorCode::AppleNewsFormat => "Article couldn't be converted to Apple news format",
            ErrorCode::AppleNewsPublish => "Failed to publish article to Apple News",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Description registered for a numeric code.
pub fn describe(code: u32) -> Option<&'static str> {
    ErrorCode::from_code(code).map(ErrorCode::description)
}

/// Raised while mapping a CMS record to an Agenda entry. These are not
/// recovered from; the caller's publish fails.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("item type {0:?} cannot be formatted for Agenda")]
    Unsupported(String),
    #[error("item {item} is missing {field}")]
    MissingField { item: String, field: &'static str },
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
    #[error("planning item {planning} links to missing event {event}")]
    MissingEvent { planning: String, event: String },
    #[error("record store error: {0}")]
    Store(#[source] BoxError),
}

/// Raised by the transmitter. Credential lookups never produce one of these;
/// they fall back to the destination secret instead.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Error pushing item {status}: {body} (destination {destination})")]
    HttpPush {
        status: u16,
        body: String,
        destination: String,
    },
    #[error("transport error pushing to {destination}: {source}")]
    Transport {
        destination: String,
        #[source]
        source: BoxError,
    },
    /// The Agenda id could not be written back after a successful push.
    #[error("record store error: {0}")]
    Store(#[source] BoxError),
}

impl PublishError {
    /// The HTTP push transmitter registers a single code. Every failure it
    /// raises is reported under it, write-back failures included.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::HttpPush
    }

    /// HTTP status returned by Agenda, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::HttpPush { status, .. } => Some(*status),
            _ => None,
        }
    }
}
