//! Error taxonomy for catalog queries and credential brokering
//!
//! Every failure surfaces to the direct caller unchanged. Nothing here
//! retries, and a failed pagination loop never hands back a partial result.

use thiserror::Error;

use crate::credentials::CredentialsError;

/// Main error type for the access layer
#[derive(Error, Debug)]
pub enum TwinMakerError {
    /// Missing or contradictory query fields. Raised before any remote call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    RemoteCall(#[from] RemoteError),

    #[error("policy construction failed: {0}")]
    PolicyConstruction(#[from] PolicyError),

    #[error("workspace lookup failed: {0}")]
    WorkspaceLookup(#[source] Box<TwinMakerError>),

    #[error("assume role failed: {0}")]
    AssumeRole(#[source] Box<TwinMakerError>),

    #[error("credential refresh failed: {0}")]
    CredentialRefresh(#[source] CredentialsError),

    #[error("session token issuance failed: {0}")]
    TokenIssuance(#[source] Box<TwinMakerError>),

    #[error("{0}")]
    Cancelled(CancelReason),
}

impl TwinMakerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Wrap a remote failure with a broker-specific variant, letting a
    /// caller-driven abort through untouched.
    pub(crate) fn wrap_unless_cancelled(
        self,
        wrap: impl FnOnce(Box<TwinMakerError>) -> TwinMakerError,
    ) -> TwinMakerError {
        if self.is_cancelled() {
            self
        } else {
            wrap(Box::new(self))
        }
    }
}

/// Required-field failures. The messages are shown verbatim to dashboard users.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing workspace id")]
    MissingWorkspaceId,

    #[error("missing entity id")]
    MissingEntityId,

    #[error("missing component name")]
    MissingComponentName,

    #[error("missing component type id")]
    MissingComponentTypeId,

    #[error("missing property")]
    MissingProperty,

    #[error("missing entity id & component type id - either one required")]
    MissingEntityOrComponentType,

    #[error("missing time range")]
    MissingTimeRange,
}

/// Failures establishing a service handle
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("missing region")]
    MissingRegion,

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("missing static keys for auth type '{auth_type}'")]
    MissingStaticKeys { auth_type: &'static str },

    #[error("could not resolve credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// A well-formed request the remote service rejected or never answered
#[derive(Error, Debug, Clone)]
#[error("{service} {operation} failed{}: {message}", describe_status(*status, code.as_deref()))]
pub struct RemoteError {
    pub service: &'static str,
    pub operation: &'static str,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

fn describe_status(status: Option<u16>, code: Option<&str>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!(" ({} {})", status, code),
        (Some(status), None) => format!(" ({})", status),
        (None, Some(code)) => format!(" ({})", code),
        (None, None) => String::new(),
    }
}

impl RemoteError {
    pub fn new(service: &'static str, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            operation,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Inline session policy could not be built from the workspace descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("workspace has no ARN")]
    MissingWorkspaceArn,

    #[error("workspace ARN '{0}' is not a valid ARN")]
    InvalidWorkspaceArn(String),

    #[error("workspace has no s3 location")]
    MissingS3Location,

    #[error("s3 location '{0}' does not name a bucket")]
    InvalidS3Location(String),

    #[error("policy is {length} characters, limit is {limit}")]
    TooLarge { length: usize, limit: usize },

    #[error("policy serialization failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::DeadlineExceeded => write!(f, "request deadline exceeded"),
        }
    }
}

pub type Result<T> = std::result::Result<T, TwinMakerError>;
