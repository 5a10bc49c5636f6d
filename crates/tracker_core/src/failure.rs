use std::fmt;

use crate::ResourceId;

/// Failure of a single network/timeout-bound fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    InvalidUrl,
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    /// The server answered, but with an overload or outage status (5xx, 429).
    ServerUnavailable { status: u16 },
    Cancelled,
    Network,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::InvalidUrl => write!(f, "invalid url"),
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            TransportKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            TransportKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            TransportKind::ServerUnavailable { status } => {
                write!(f, "server unavailable (http {status})")
            }
            TransportKind::Cancelled => write!(f, "cancelled"),
            TransportKind::Network => write!(f, "network error"),
        }
    }
}

/// Category of a non-fatal problem reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Transport,
    NoIdentifier,
    AmbiguousContent,
    InteractionFailure,
    Store,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::NoIdentifier => write!(f, "no identifier"),
            FailureKind::AmbiguousContent => write!(f, "ambiguous content"),
            FailureKind::InteractionFailure => write!(f, "interaction failure"),
            FailureKind::Store => write!(f, "store error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    pub kind: FailureKind,
    pub identifier: Option<ResourceId>,
    pub url: Option<String>,
    pub message: String,
}

impl SoftFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: None,
            url: None,
            message: message.into(),
        }
    }

    pub fn for_resource(mut self, identifier: &ResourceId, url: &str) -> Self {
        self.identifier = Some(identifier.clone());
        self.url = Some(url.to_string());
        self
    }

    pub fn for_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = &self.identifier {
            write!(f, " [{id}]")?;
        }
        if let Some(url) = &self.url {
            write!(f, " {url}")?;
        }
        write!(f, ": {}", self.message)
    }
}
