//! Snapshot export and import.
//!
//! A snapshot is the whole document serialized as JSON. Import either
//! replaces the local document or reconciles the two copies: chat history is
//! merged message-by-message, everything else is taken from the incoming
//! snapshot wholesale.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::db::{SnapshotStore, Store};
use crate::error::StoreError;
use crate::types::{AppDb, Chat};

/// How an imported snapshot is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Discard the local document entirely.
    Replace,
    /// Reconcile chat history with the local document, take the rest from
    /// the snapshot.
    Sync,
}

/// Merge two documents for a sync import.
///
/// Users, projects, tasks, and credentials come from `imported` wholesale.
/// Chats are matched by id: messages from both sides are kept, deduplicated
/// by message id with the local copy winning, and reordered by timestamp.
/// Chats present on only one side are kept as-is.
///
/// Merging a document with itself yields that document back.
pub fn merge_snapshots(local: AppDb, imported: AppDb) -> AppDb {
    let mut chats = local.chats;

    for incoming in imported.chats {
        match chats.iter_mut().find(|c| c.id == incoming.id) {
            Some(existing) => merge_chat_messages(existing, incoming),
            None => chats.push(incoming),
        }
    }

    AppDb {
        users: imported.users,
        projects: imported.projects,
        tasks: imported.tasks,
        chats,
        credentials: imported.credentials,
    }
}

/// Union `incoming`'s messages into `existing`, keyed by message id, then
/// restore chronological order. Stable sort keeps same-timestamp messages in
/// their existing relative order.
fn merge_chat_messages(existing: &mut Chat, incoming: Chat) {
    let known: HashSet<String> = existing.messages.iter().map(|m| m.id.0.clone()).collect();
    existing
        .messages
        .extend(incoming.messages.into_iter().filter(|m| !known.contains(&m.id.0)));
    existing.messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}

impl Store {
    /// Serialize the current document to a JSON string.
    pub fn export(&self) -> Result<String, StoreError> {
        let db = self.load()?;
        Ok(serde_json::to_string_pretty(&db)?)
    }

    /// Serialize the current document to a file.
    pub fn export_to(&self, path: &Path) -> Result<(), StoreError> {
        let json = self.export()?;
        fs::write(path, json).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply a snapshot from a JSON string.
    ///
    /// The payload is validated in full before the local document is touched,
    /// so a malformed snapshot leaves the store unchanged.
    pub fn import_str(&self, json: &str, mode: ImportMode) -> Result<(), StoreError> {
        let imported: AppDb =
            serde_json::from_str(json).map_err(|e| StoreError::InvalidSnapshot {
                reason: e.to_string(),
            })?;

        let merged = match mode {
            ImportMode::Replace => imported,
            ImportMode::Sync => merge_snapshots(self.load()?, imported),
        };
        self.save(&merged)?;

        info!(mode = ?mode, chats = merged.chats.len(), "imported snapshot");
        Ok(())
    }

    /// Apply a snapshot from a file.
    pub fn import_file(&self, path: &Path, mode: ImportMode) -> Result<(), StoreError> {
        let json = fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.import_str(&json, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewMessage, NewUser};
    use crate::types::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn message(id: &str, sender: &str, secs: i64) -> Message {
        Message {
            id: MessageId(id.to_string()),
            sender_id: UserId(sender.to_string()),
            text: format!("msg {id}"),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            image_url: None,
            document_url: None,
            read_by: vec![UserId(sender.to_string())],
        }
    }

    fn chat_with(id: &str, messages: Vec<Message>) -> Chat {
        Chat {
            id: ChatId(id.to_string()),
            name: String::new(),
            participant_ids: vec![UserId("a".into()), UserId("b".into())],
            messages,
            is_group: false,
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut db = AppDb::default();
        db.chats.push(chat_with(
            "c1",
            vec![message("m1", "a", 0), message("m2", "b", 1)],
        ));

        let merged = merge_snapshots(db.clone(), db.clone());
        assert_eq!(
            serde_json::to_string(&merged).unwrap(),
            serde_json::to_string(&db).unwrap()
        );
    }

    #[test]
    fn test_merge_unions_diverged_chat_history() {
        // Local has [m1, m2]; the snapshot has [m2, m3].
        let mut local = AppDb::default();
        local.chats.push(chat_with(
            "c1",
            vec![message("m1", "a", 0), message("m2", "b", 1)],
        ));

        let mut imported = AppDb::default();
        imported.chats.push(chat_with(
            "c1",
            vec![message("m2", "b", 1), message("m3", "a", 2)],
        ));

        let merged = merge_snapshots(local, imported);
        assert_eq!(merged.chats.len(), 1);
        let ids: Vec<_> = merged.chats[0].messages.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_merge_reorders_by_timestamp() {
        let mut local = AppDb::default();
        local.chats.push(chat_with("c1", vec![message("late", "a", 10)]));

        let mut imported = AppDb::default();
        imported
            .chats
            .push(chat_with("c1", vec![message("early", "b", 1)]));

        let merged = merge_snapshots(local, imported);
        let ids: Vec<_> = merged.chats[0].messages.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_merge_keeps_chats_unique_to_either_side() {
        let mut local = AppDb::default();
        local.chats.push(chat_with("only-local", vec![]));

        let mut imported = AppDb::default();
        imported.chats.push(chat_with("only-imported", vec![]));

        let merged = merge_snapshots(local, imported);
        let mut ids: Vec<_> = merged.chats.iter().map(|c| c.id.0.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["only-imported", "only-local"]);
    }

    #[test]
    fn test_merge_takes_records_from_import() {
        let mut local = AppDb::default();
        local.users.push(User {
            id: UserId("u-old".into()),
            name: "Old".into(),
            role: Role::Employee,
            avatar: String::new(),
            account_id: "old1".into(),
        });

        let mut imported = AppDb::default();
        imported.users.push(User {
            id: UserId("u-new".into()),
            name: "New".into(),
            role: Role::Admin,
            avatar: String::new(),
            account_id: "new1".into(),
        });

        let merged = merge_snapshots(local, imported);
        assert_eq!(merged.users.len(), 1);
        assert_eq!(merged.users[0].id.0, "u-new");
    }

    #[test]
    fn test_import_rejects_incomplete_payload_without_mutating() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        let before = store.export().unwrap();

        // No chats or credentials fields
        let err = store
            .import_str(r#"{"users": [], "tasks": []}"#, ImportMode::Sync)
            .unwrap_err();
        assert_eq!(err.key(), "invalidSnapshot");

        assert_eq!(store.export().unwrap(), before);
    }

    #[test]
    fn test_import_replace_discards_local_state() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        store
            .create_user(NewUser {
                name: "Local Only".into(),
                role: Role::Employee,
                password: None,
                avatar: None,
            })
            .unwrap();

        let empty = serde_json::to_string(&AppDb::default()).unwrap();
        store.import_str(&empty, ImportMode::Replace).unwrap();

        assert!(store.users().unwrap().is_empty());
    }

    #[test]
    fn test_export_import_sync_between_stores() {
        let dir = TempDir::new().unwrap();
        let a = Store::open(dir.path().join("a/app_db.json")).unwrap();
        let b = Store::open(dir.path().join("b/app_db.json")).unwrap();

        let ua = UserId("ua".into());
        let ub = UserId("ub".into());

        // Same chat id on both sides, different messages
        let chat = a.find_or_create_chat(&ua, &ub).unwrap();
        a.send_message(&chat.id, NewMessage::text(ua.clone(), "from a"))
            .unwrap();

        let mut b_db = b.load().unwrap();
        b_db.chats.push(Chat {
            id: chat.id.clone(),
            name: String::new(),
            participant_ids: vec![ua.clone(), ub.clone()],
            messages: vec![message("mb", "ub", 0)],
            is_group: false,
        });
        b.save(&b_db).unwrap();

        let snapshot = a.export().unwrap();
        b.import_str(&snapshot, ImportMode::Sync).unwrap();

        let merged = b.load().unwrap();
        let merged_chat = merged.chats.iter().find(|c| c.id == chat.id).unwrap();
        assert_eq!(merged_chat.messages.len(), 2);
        // Document is still well-formed after the merge
        assert!(merged.check_invariants().is_empty());

        // Timestamps strictly ascending or equal
        let ts: Vec<_> = merged_chat.messages.iter().map(|m| m.timestamp).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted);
    }
}
