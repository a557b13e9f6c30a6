use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Avatar used when a user is created without one: a neutral head-and-shoulders
/// glyph inlined as an SVG data URL so the document stays self-contained.
pub const DEFAULT_AVATAR: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHZpZXdCb3g9IjAgMCAyNCAyNCIgZmlsbD0iI2EwYWViZiI+PHBhdGggZD0iTTEyIDJDNi40OCAyIDIgNi40OCAyIDEyczQuNDggMTAgMTAgMTAgMTAtNC40OCAxMC0xMFMxNy41MiAyIDEyIDJ6bTAgM2MxLjY2IDAgMyAxLjM0IDMgM3MtMS4zNCAzLTMgMy0zLTEuMzQtMy0zIDEuMzQtMyAzLTN6bTAgMTRjLTIuNjcgMC04IDEuMzQtOCA0djJoMTZ2LTJjMC0yLjY2LTUuMzMtNC04LTR6Ii8+PC9zdmc+";

/// Unique identifier for a user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User role, controls which dashboard views an account sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            _ => anyhow::bail!("Unknown role: {}", s),
        }
    }
}

/// Task lifecycle state. Serialized upper-snake for compatibility with
/// existing exported documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    OnHold,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::OnHold => "ON_HOLD",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "ON_HOLD" => Ok(TaskStatus::OnHold),
            _ => anyhow::bail!("Unknown task status: {}", s),
        }
    }
}

/// An account that can sign in and appear on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    /// Data URL, either uploaded by the user or [`DEFAULT_AVATAR`].
    pub avatar: String,
    /// Random-looking display identifier, distinct from the internal id.
    /// Admins search each other by this value.
    pub account_id: String,
}

/// Plaintext login secret for a user.
///
/// The credentials map is keyed by the owning user's id; `user_id` is kept
/// in the record so a document can be checked for mis-keyed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub password: String,
}

/// A color-coded grouping for tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub color: String,
}

/// A unit of work on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub assignee_ids: Vec<UserId>,
    pub due_date: chrono::DateTime<chrono::Utc>,
    pub status: TaskStatus,
    pub created_by: UserId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub document_url: Option<String>,
    pub read_by: Vec<UserId>,
}

/// A direct or group conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub participant_ids: Vec<UserId>,
    pub messages: Vec<Message>,
    pub is_group: bool,
}

impl Chat {
    /// The other participant of a one-to-one chat, if any.
    pub fn partner_of(&self, viewer: &UserId) -> Option<&UserId> {
        if self.is_group {
            return None;
        }
        self.participant_ids.iter().find(|id| *id != viewer)
    }
}

/// The aggregate root: the entire application state as one document.
///
/// `projects` defaults to empty when absent; the other four fields are
/// required, so an import payload missing any of them fails to decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppDb {
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub chats: Vec<Chat>,
    pub credentials: BTreeMap<String, Credential>,
}

impl AppDb {
    /// Check document invariants.
    ///
    /// Mutation sites keep these holding individually; this is the
    /// whole-document check used by tests and by import diagnostics.
    /// Returns every violation found, empty when the document is sound.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for chat in &self.chats {
            let mut seen = HashSet::new();
            for message in &chat.messages {
                if !seen.insert(&message.id) {
                    violations.push(format!(
                        "chat {} has duplicate message id {}",
                        chat.id, message.id
                    ));
                }
            }

            if !chat.is_group && chat.participant_ids.len() != 2 {
                violations.push(format!(
                    "one-to-one chat {} has {} participants",
                    chat.id,
                    chat.participant_ids.len()
                ));
            }
        }

        let user_ids: HashSet<&UserId> = self.users.iter().map(|u| &u.id).collect();
        for (key, credential) in &self.credentials {
            if key != &credential.user_id.0 {
                violations.push(format!(
                    "credential keyed by {} but owned by user {}",
                    key, credential.user_id
                ));
            }
            if !user_ids.contains(&credential.user_id) {
                violations.push(format!(
                    "credential references missing user {}",
                    credential.user_id
                ));
            }
        }

        violations
    }

    /// Look up a user by internal id.
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    /// Look up a user by display account id.
    pub fn user_by_account_id(&self, account_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.account_id == account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, sender: &str, at: i64) -> Message {
        Message {
            id: MessageId(id.to_string()),
            sender_id: UserId(sender.to_string()),
            text: "hi".to_string(),
            timestamp: Utc.timestamp_opt(at, 0).unwrap(),
            image_url: None,
            document_url: None,
            read_by: vec![UserId(sender.to_string())],
        }
    }

    #[test]
    fn test_id_generation() {
        let id1 = UserId::new();
        let id2 = UserId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(Role::Admin.as_str(), "admin");
        assert_eq!(Role::Employee.as_str(), "employee");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!("employee".parse::<Role>().unwrap(), Role::Employee);
    }

    #[test]
    fn test_task_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::OnHold).unwrap(),
            "\"ON_HOLD\""
        );
        assert_eq!("PENDING".parse::<TaskStatus>().unwrap(), TaskStatus::Pending);
        assert!("on_hold".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        // No `chats` key: must fail to decode
        let payload = r#"{"users":[],"tasks":[],"credentials":{}}"#;
        assert!(serde_json::from_str::<AppDb>(payload).is_err());
    }

    #[test]
    fn test_missing_projects_defaults_empty() {
        let payload = r#"{"users":[],"tasks":[],"chats":[],"credentials":{}}"#;
        let db: AppDb = serde_json::from_str(payload).unwrap();
        assert!(db.projects.is_empty());
    }

    #[test]
    fn test_invariants_duplicate_message_id() {
        let mut db = AppDb::default();
        db.chats.push(Chat {
            id: ChatId::new(),
            name: String::new(),
            participant_ids: vec![UserId("a".into()), UserId("b".into())],
            messages: vec![message("m1", "a", 0), message("m1", "b", 1)],
            is_group: false,
        });

        let violations = db.check_invariants();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("duplicate message id"));
    }

    #[test]
    fn test_invariants_direct_chat_participants() {
        let mut db = AppDb::default();
        db.chats.push(Chat {
            id: ChatId::new(),
            name: String::new(),
            participant_ids: vec![UserId("a".into())],
            messages: vec![],
            is_group: false,
        });

        assert!(!db.check_invariants().is_empty());
    }

    #[test]
    fn test_invariants_mis_keyed_credential() {
        let mut db = AppDb::default();
        let user = User {
            id: UserId("u1".into()),
            name: "A".into(),
            role: Role::Admin,
            avatar: DEFAULT_AVATAR.into(),
            account_id: "a1".into(),
        };
        db.users.push(user);
        // Keyed by account id instead of user id: flagged
        db.credentials.insert(
            "a1".into(),
            Credential {
                user_id: UserId("u1".into()),
                password: "pw".into(),
            },
        );

        let violations = db.check_invariants();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("keyed by"));
    }

    #[test]
    fn test_partner_of() {
        let chat = Chat {
            id: ChatId::new(),
            name: String::new(),
            participant_ids: vec![UserId("a".into()), UserId("b".into())],
            messages: vec![],
            is_group: false,
        };
        assert_eq!(
            chat.partner_of(&UserId("a".into())),
            Some(&UserId("b".into()))
        );

        let group = Chat {
            is_group: true,
            ..chat.clone()
        };
        assert_eq!(group.partner_of(&UserId("a".into())), None);
    }
}
