use std::time::Duration;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the orchestrator and
/// the error backstop can treat failures uniformly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("controller `{controller}` failed to register: {reason}")]
    Controller { controller: String, reason: String },

    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Dependency container failures. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("unregistered dependency `{name}`{}", required_by_suffix(.required_by))]
    Unregistered {
        name: String,
        required_by: Option<String>,
    },

    #[error("`{owner}` read dependency `{name}` without declaring it")]
    Undeclared { name: String, owner: String },

    #[error("dependency cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("dependency `{name}` is not a `{expected}`")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("factory for `{name}` failed: {reason}")]
    Factory { name: String, reason: String },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(owner) => format!(" (required by `{owner}`)"),
        None => String::new(),
    }
}

/// Failures of an outgoing Bot API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Flood control: the server asked us to wait before retrying.
    #[error("rate limited by server, retry after {0:?}")]
    RetryAfter(Duration),

    /// Connection/transport level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the request; retrying will not help.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetryAfter(_) | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_message_names_the_owner() {
        let err = ContainerError::Unregistered {
            name: "cache".to_string(),
            required_by: Some("chats".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unregistered dependency `cache` (required by `chats`)"
        );
    }

    #[test]
    fn only_retry_after_and_network_are_transient() {
        assert!(ApiError::RetryAfter(Duration::from_secs(1)).is_transient());
        assert!(ApiError::Network("reset".to_string()).is_transient());
        assert!(!ApiError::Rejected("chat not found".to_string()).is_transient());
    }
}
