use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tenant id is required")]
    MissingTenant,
    #[error("user id is required")]
    MissingUser,
    #[error("tenant id `{0}` contains reserved characters")]
    InvalidTenant(String),
    #[error("message is {length} characters, limit is {max}")]
    MessageTooLong { length: usize, max: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown tenant `{0}`")]
    UnknownTenant(String),
    #[error("no menu available for tenant `{0}`")]
    MenuUnavailable(String),
}

/// Failures of one conversational turn. Only `Validation` and `Lookup`
/// leave the pipeline as errors; the rest resolve to templated replies.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("upstream unavailable: {0}")]
    TransientUpstream(String),
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "This restaurant is not available right now.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ConversationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ConversationError> for InterfaceError {
    fn from(value: ConversationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ConversationError::Validation(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ConversationError::Lookup(error) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ConversationError::TransientUpstream(message)
            | ConversationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ConversationError::DataIntegrity(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ConversationError, InterfaceError, LookupError, ValidationError};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface =
            ConversationError::from(ValidationError::MissingUser).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn lookup_error_maps_to_not_found() {
        let interface =
            ConversationError::from(LookupError::UnknownTenant("ghost".to_owned()))
                .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ConversationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
