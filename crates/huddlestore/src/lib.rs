//! huddlestore - single-document state store for the Huddle team app.
//!
//! All application state (users, credentials, projects, tasks, chats) lives
//! in one JSON document on disk. Every operation reads the whole document,
//! mutates it, and writes it back; there is no partial update and no lock.
//! That makes the document trivially portable: [`Store::export`] hands you
//! the whole world as JSON, and [`Store::import_str`] brings one back, with
//! [`ImportMode::Sync`] reconciling diverged chat history message-by-message.
//!
//! ```no_run
//! use huddlestore::{Role, NewUser, Store};
//!
//! # fn main() -> Result<(), huddlestore::StoreError> {
//! let store = Store::open("/tmp/huddle/app_db.json")?;
//! let user = store.create_user(NewUser {
//!     name: "Jane Doe".into(),
//!     role: Role::Employee,
//!     password: Some("secret".into()),
//!     avatar: None,
//! })?;
//! assert!(store.login(&user.account_id, "secret")?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod snapshot;
pub mod types;
pub mod watch;

pub use db::{
    NewChat, NewMessage, NewTask, NewUser, SeedAdmin, SnapshotStore, Store, TaskPatch, UserPatch,
};
pub use error::StoreError;
pub use snapshot::{merge_snapshots, ImportMode};
pub use types::{
    AppDb, Chat, ChatId, Credential, Message, MessageId, Project, ProjectId, Role, Task, TaskId,
    TaskStatus, User, UserId, DEFAULT_AVATAR,
};
pub use watch::{diff_chats, ChatEvent, ChatWatcher};
