use thiserror::Error;
use tracing::error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the lifecycle service.
///
/// `Display` only ever renders the stable public message. Store and
/// collaborator failures are kept as the `source` so they can be logged, and
/// are logged once when wrapped.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    TooManyInstances(String),

    #[error("{0}")]
    InsufficientQuota(String),

    #[error("{message}")]
    FailedToCheckQuota {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    SsoClientCreation {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    ExternalProvisioning {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{message}")]
    FailedToParseSearch {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{message}")]
    General {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl ServiceError {
    pub fn general(
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        let message = message.into();
        let source = cause.into();
        error!(error = %source, "{message}");
        ServiceError::General {
            message,
            source: Some(source),
        }
    }

    pub fn general_msg(message: impl Into<String>) -> Self {
        ServiceError::General {
            message: message.into(),
            source: None,
        }
    }

    pub fn failed_to_check_quota(
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        let message = message.into();
        let source = cause.into();
        error!(error = %source, "{message}");
        ServiceError::FailedToCheckQuota { message, source }
    }

    pub fn sso_client_creation(
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        let message = message.into();
        let source = cause.into();
        error!(error = %source, "{message}");
        ServiceError::SsoClientCreation { message, source }
    }

    pub fn external_provisioning(
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        let message = message.into();
        let source = cause.into();
        error!(error = %source, "{message}");
        ServiceError::ExternalProvisioning { message, source }
    }

    pub fn failed_to_parse_search(
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        let message = message.into();
        let source = cause.into();
        tracing::warn!(error = %source, "{message}");
        ServiceError::FailedToParseSearch { message, source }
    }

    /// Stable numeric code from the fleet manager error catalogue.
    pub fn code(&self) -> u32 {
        match self {
            ServiceError::InvalidTransition(_) => 6,
            ServiceError::NotFound(_) => 7,
            ServiceError::Validation(_) => 8,
            ServiceError::General { .. } => 9,
            ServiceError::Unauthenticated(_) => 15,
            ServiceError::FailedToParseSearch { .. } => 23,
            ServiceError::TooManyInstances(_) => 24,
            ServiceError::SsoClientCreation { .. } => 106,
            ServiceError::ExternalProvisioning { .. } => 109,
            ServiceError::InsufficientQuota(_) => 120,
            ServiceError::FailedToCheckQuota { .. } => 121,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::Validation(_)
            | ServiceError::FailedToParseSearch { .. } => 400,
            ServiceError::Unauthenticated(_) => 401,
            ServiceError::TooManyInstances(_)
            | ServiceError::InsufficientQuota(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::InvalidTransition(_) => 409,
            ServiceError::FailedToCheckQuota { .. }
            | ServiceError::SsoClientCreation { .. }
            | ServiceError::ExternalProvisioning { .. }
            | ServiceError::General { .. } => 500,
        }
    }

    /// Code rendered the way the REST layer reports it, e.g. `KAFKAS-MGMT-24`.
    pub fn code_str(&self) -> String {
        format!("KAFKAS-MGMT-{}", self.code())
    }
}

/// Failure of a guarded status update. `attempted` is false when the
/// transition guard refused the change before anything was written.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct StatusUpdateError {
    pub attempted: bool,
    #[source]
    pub error: ServiceError,
}

impl StatusUpdateError {
    pub fn rejected(error: ServiceError) -> Self {
        Self {
            attempted: false,
            error,
        }
    }

    pub fn failed(error: ServiceError) -> Self {
        Self {
            attempted: true,
            error,
        }
    }
}

impl From<StatusUpdateError> for ServiceError {
    fn from(e: StatusUpdateError) -> Self {
        e.error
    }
}
