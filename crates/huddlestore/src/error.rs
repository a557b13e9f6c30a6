use std::path::PathBuf;

use thiserror::Error;

/// Store operation errors.
///
/// Each variant maps to a stable message key via [`StoreError::key`]; the UI
/// layer resolves keys to localized text, this crate never does.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account id already registered: {account_id}")]
    UsernameExists { account_id: String },

    #[error("old password does not match")]
    OldPasswordIncorrect,

    #[error("no credential on record for user {user_id}")]
    CredentialsNotFound { user_id: String },

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("invalid snapshot payload: {reason}")]
    InvalidSnapshot { reason: String },

    #[error("store i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode store document: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    /// Stable message key for UI-side localization.
    pub fn key(&self) -> &'static str {
        match self {
            StoreError::UsernameExists { .. } => "usernameExists",
            StoreError::OldPasswordIncorrect => "oldPasswordIncorrect",
            StoreError::CredentialsNotFound { .. } => "userOrCredentialsNotFound",
            StoreError::UserNotFound(_) => "userNotFound",
            StoreError::TaskNotFound(_) => "taskNotFound",
            StoreError::ChatNotFound(_) => "chatNotFound",
            StoreError::InvalidSnapshot { .. } => "invalidSnapshot",
            StoreError::Io { .. } | StoreError::Decode(_) => "storageFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_keys() {
        let err = StoreError::UsernameExists {
            account_id: "admin".into(),
        };
        assert_eq!(err.key(), "usernameExists");
        assert_eq!(StoreError::OldPasswordIncorrect.key(), "oldPasswordIncorrect");
        assert_eq!(
            StoreError::CredentialsNotFound {
                user_id: "u1".into()
            }
            .key(),
            "userOrCredentialsNotFound"
        );
    }
}
