use thiserror::Error;

use crate::errors::ValidationErrors;

/// Failures surfaced by [`super::ReviewClient`].
///
/// `Validation` is raised before any request is sent and is fixable by
/// editing the document. `Remote` covers everything that happened on the
/// wire or on the server.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("this action is already in progress")]
    InFlight,
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {}", messages.join(" "))]
    Server { status: u16, messages: Vec<String> },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// Connect failures, timeouts and gateway errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport(e) => e.is_connect() || e.is_timeout(),
            RemoteError::Server { status, .. } => matches!(status, 502..=504),
            RemoteError::Decode(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Transport(e) => e.status().map(|s| s.as_u16()),
            RemoteError::Server { status, .. } => Some(*status),
            RemoteError::Decode(_) => None,
        }
    }
}

impl ClientError {
    /// Messages to show the user, whichever side produced them.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ClientError::Validation(errors) => errors.messages().map(str::to_string).collect(),
            ClientError::Remote(RemoteError::Server { messages, .. }) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_are_retryable() {
        for status in [502, 503, 504] {
            let err = RemoteError::Server { status, messages: vec![] };
            assert!(err.is_retryable(), "{status}");
        }
        for status in [400, 403, 404, 409, 500] {
            let err = RemoteError::Server { status, messages: vec![] };
            assert!(!err.is_retryable(), "{status}");
        }
    }

    #[test]
    fn validation_messages_pass_through() {
        let mut errors = ValidationErrors::new();
        errors.add("7", "Remarks required for NO responses.");
        errors.add(ValidationErrors::NON_FIELD, "Cannot reject when all responses are YES.");
        let err = ClientError::from(errors);
        assert_eq!(
            err.messages(),
            vec![
                "Remarks required for NO responses.".to_string(),
                "Cannot reject when all responses are YES.".to_string()
            ]
        );
    }
}
