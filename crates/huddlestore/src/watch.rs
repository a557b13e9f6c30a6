//! Change detection for the chat feed.
//!
//! The UI polls the store on an interval and wants to surface "someone
//! started a chat with you" and "new message" events. [`diff_chats`] computes
//! those events from two successive views of a user's chats; [`ChatWatcher`]
//! wraps a store and keeps the previous view between polls.

use std::collections::HashMap;

use tracing::debug;

use crate::db::SnapshotStore;
use crate::error::StoreError;
use crate::types::{Chat, ChatId, Message, UserId};

/// Something new in the viewer's chats since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A chat the viewer had not seen before, opened by someone else.
    ChatStarted { chat_id: ChatId, sender_id: UserId },
    /// A known chat grew and its latest message is from someone else.
    MessageReceived { chat_id: ChatId, message: Message },
}

/// Compare two successive views of `viewer`'s chats.
///
/// The viewer's own messages never produce events. A brand-new chat only
/// counts once its first message exists, so creating an empty chat is silent
/// until somebody speaks.
pub fn diff_chats(old: &[Chat], new: &[Chat], viewer: &UserId) -> Vec<ChatEvent> {
    let old_by_id: HashMap<&str, &Chat> = old.iter().map(|c| (c.id.0.as_str(), c)).collect();

    let mut events = Vec::new();
    for chat in new {
        match old_by_id.get(chat.id.0.as_str()) {
            None => {
                // Unseen chat: announce it if someone else has spoken
                if let Some(first) = chat.messages.first() {
                    if first.sender_id != *viewer {
                        events.push(ChatEvent::ChatStarted {
                            chat_id: chat.id.clone(),
                            sender_id: first.sender_id.clone(),
                        });
                    }
                }
            }
            Some(prev) => {
                if chat.messages.len() > prev.messages.len() {
                    if let Some(last) = chat.messages.last() {
                        if last.sender_id != *viewer {
                            events.push(ChatEvent::MessageReceived {
                                chat_id: chat.id.clone(),
                                message: last.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    events
}

/// Stateful poller over a store, for one viewer.
pub struct ChatWatcher<S: SnapshotStore> {
    store: S,
    viewer: UserId,
    last: Vec<Chat>,
}

impl<S: SnapshotStore> ChatWatcher<S> {
    /// Start watching. The current state becomes the baseline, so only
    /// activity after this call produces events.
    pub fn new(store: S, viewer: UserId) -> Result<Self, StoreError> {
        let last = chats_for(&store, &viewer)?;
        Ok(Self { store, viewer, last })
    }

    /// Re-read the store and return events since the previous poll.
    pub fn poll(&mut self) -> Result<Vec<ChatEvent>, StoreError> {
        let current = chats_for(&self.store, &self.viewer)?;
        let events = diff_chats(&self.last, &current, &self.viewer);
        if !events.is_empty() {
            debug!(viewer = %self.viewer, events = events.len(), "chat activity");
        }
        self.last = current;
        Ok(events)
    }
}

fn chats_for<S: SnapshotStore>(store: &S, viewer: &UserId) -> Result<Vec<Chat>, StoreError> {
    Ok(store
        .load()?
        .chats
        .into_iter()
        .filter(|c| c.participant_ids.contains(viewer))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewChat, NewMessage, Store};
    use tempfile::TempDir;

    #[test]
    fn test_diff_reports_new_message_from_others_only() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        let me = UserId("me".into());
        let them = UserId("them".into());
        let chat = store.find_or_create_chat(&me, &them).unwrap();

        let mut watcher =
            ChatWatcher::new(Store::open(dir.path().join("app_db.json")).unwrap(), me.clone())
                .unwrap();

        // My own message is silent
        store
            .send_message(&chat.id, NewMessage::text(me.clone(), "hi"))
            .unwrap();
        assert!(watcher.poll().unwrap().is_empty());

        // Their reply is not
        let reply = store
            .send_message(&chat.id, NewMessage::text(them.clone(), "hello"))
            .unwrap();
        let events = watcher.poll().unwrap();
        assert_eq!(
            events,
            vec![ChatEvent::MessageReceived {
                chat_id: chat.id.clone(),
                message: reply,
            }]
        );

        // No repeat on the next poll
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_diff_reports_chat_started() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        let me = UserId("me".into());
        let them = UserId("them".into());

        let mut watcher =
            ChatWatcher::new(Store::open(dir.path().join("app_db.json")).unwrap(), me.clone())
                .unwrap();

        // Chat appears and gets its first message between two polls
        let chat = store.find_or_create_chat(&them, &me).unwrap();
        store
            .send_message(&chat.id, NewMessage::text(them.clone(), "ping"))
            .unwrap();
        let events = watcher.poll().unwrap();
        assert_eq!(
            events,
            vec![ChatEvent::ChatStarted {
                chat_id: chat.id,
                sender_id: them,
            }]
        );
    }

    #[test]
    fn test_watcher_ignores_chats_without_viewer() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        let me = UserId("me".into());
        let a = UserId("a".into());
        let b = UserId("b".into());

        let mut watcher =
            ChatWatcher::new(Store::open(dir.path().join("app_db.json")).unwrap(), me).unwrap();

        let chat = store.find_or_create_chat(&a, &b).unwrap();
        store
            .send_message(&chat.id, NewMessage::text(a, "not for you"))
            .unwrap();
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_diff_chat_started_only_counts_first_message_from_others() {
        let me = UserId("me".into());
        let them = UserId("them".into());

        let new = vec![Chat {
            id: ChatId("c1".into()),
            name: String::new(),
            participant_ids: vec![me.clone(), them.clone()],
            messages: vec![Message {
                id: crate::types::MessageId("m1".into()),
                sender_id: me.clone(),
                text: "I started this".into(),
                timestamp: chrono::Utc::now(),
                image_url: None,
                document_url: None,
                read_by: vec![me.clone()],
            }],
            is_group: false,
        }];

        // First message is mine, so an unseen chat stays silent
        assert!(diff_chats(&[], &new, &me).is_empty());
        // From the other side it is an announcement
        assert_eq!(diff_chats(&[], &new, &them).len(), 1);
    }

    #[test]
    fn test_diff_group_chat_message() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("app_db.json")).unwrap();
        let me = UserId("me".into());
        let a = UserId("a".into());

        let chat = store
            .create_chat(NewChat {
                name: "standup".into(),
                participant_ids: vec![me.clone(), a.clone()],
                is_group: true,
            })
            .unwrap();

        let mut watcher =
            ChatWatcher::new(Store::open(dir.path().join("app_db.json")).unwrap(), me).unwrap();

        store
            .send_message(&chat.id, NewMessage::text(a, "morning"))
            .unwrap();
        let events = watcher.poll().unwrap();
        assert!(matches!(events[0], ChatEvent::MessageReceived { .. }));
    }
}
