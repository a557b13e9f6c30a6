use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::*;

/// Load/save seam over the serialized document.
///
/// The file-backed [`Store`] is the production impl; tests can substitute an
/// in-memory one for the snapshot and watch plumbing.
pub trait SnapshotStore {
    /// Read the whole document.
    fn load(&self) -> Result<AppDb, StoreError>;

    /// Write the whole document back.
    fn save(&self, db: &AppDb) -> Result<(), StoreError>;
}

/// Admin identity used to seed a brand-new store document.
#[derive(Debug, Clone)]
pub struct SeedAdmin {
    pub name: String,
    pub account_id: String,
    pub password: String,
}

impl Default for SeedAdmin {
    fn default() -> Self {
        Self {
            name: "Admin User".to_string(),
            account_id: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

impl From<&huddleconf::BootstrapConfig> for SeedAdmin {
    fn from(bootstrap: &huddleconf::BootstrapConfig) -> Self {
        Self {
            name: bootstrap.admin_name.clone(),
            account_id: bootstrap.admin_account.clone(),
            password: bootstrap.admin_password.clone(),
        }
    }
}

/// The application store: one JSON document, re-read and rewritten on every
/// operation.
///
/// There is no lock and no cross-field atomicity: concurrent writers race
/// and the last save wins. A failed save leaves the previous document intact
/// because writes go through a temp file and rename.
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open the store at `path`, seeding a fresh document with the default
    /// admin account if none exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_seed(path, &SeedAdmin::default())
    }

    /// Open the store described by a loaded configuration.
    pub fn from_config(config: &huddleconf::HuddleConfig) -> Result<Self, StoreError> {
        Self::open_with_seed(
            config.paths.store_file(),
            &SeedAdmin::from(&config.bootstrap),
        )
    }

    /// Open the store at `path`, seeding with the given admin identity.
    pub fn open_with_seed<P: AsRef<Path>>(path: P, seed: &SeedAdmin) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let store = Self { path };
        if !store.path.exists() {
            store.save(&store.seeded_db(seed))?;
            info!(path = %store.path.display(), admin = %seed.account_id, "seeded new store");
        }
        Ok(store)
    }

    /// Path of the serialized document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seeded_db(&self, seed: &SeedAdmin) -> AppDb {
        let admin_id = UserId::new();
        let mut db = AppDb::default();
        db.users.push(User {
            id: admin_id.clone(),
            name: seed.name.clone(),
            role: Role::Admin,
            avatar: DEFAULT_AVATAR.to_string(),
            account_id: seed.account_id.clone(),
        });
        db.credentials.insert(
            admin_id.0.clone(),
            Credential {
                user_id: admin_id,
                password: seed.password.clone(),
            },
        );
        db
    }

    // ---- users ----

    pub fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.load()?.users)
    }

    pub fn user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.load()?.user(id).cloned())
    }

    /// Create a user, generating a display account id from the name.
    pub fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut db = self.load()?;

        let account_id = generate_account_id(&new.name, &db);
        let user = User {
            id: UserId::new(),
            name: new.name,
            role: new.role,
            avatar: new.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            account_id,
        };

        db.users.push(user.clone());
        if let Some(password) = new.password {
            db.credentials.insert(
                user.id.0.clone(),
                Credential {
                    user_id: user.id.clone(),
                    password,
                },
            );
        }
        self.save(&db)?;

        info!(user = %user.id, account = %user.account_id, "created user");
        Ok(user)
    }

    /// Apply a partial update to a user.
    pub fn update_user(&self, id: &UserId, patch: UserPatch) -> Result<User, StoreError> {
        let mut db = self.load()?;
        let user = db
            .users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or_else(|| StoreError::UserNotFound(id.0.clone()))?;

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(avatar) = patch.avatar {
            user.avatar = avatar;
        }

        let updated = user.clone();
        self.save(&db)?;
        Ok(updated)
    }

    /// Delete a user and clean up everything that referenced them: their
    /// credential, task assignments, and chat memberships. One-to-one chats
    /// that would drop below 2 participants are pruned.
    pub fn delete_user(&self, id: &UserId) -> Result<(), StoreError> {
        let mut db = self.load()?;

        db.credentials
            .retain(|key, cred| key != &id.0 && cred.user_id != *id);
        db.users.retain(|u| &u.id != id);

        for task in &mut db.tasks {
            task.assignee_ids.retain(|a| a != id);
        }

        for chat in &mut db.chats {
            chat.participant_ids.retain(|p| p != id);
        }
        db.chats
            .retain(|c| c.is_group || c.participant_ids.len() >= 2);

        self.save(&db)?;
        info!(user = %id, "deleted user");
        Ok(())
    }

    // ---- auth and credentials ----

    /// Resolve account id and password to a user. `None` on any mismatch -
    /// bad credentials are not an error here.
    pub fn login(&self, account_id: &str, password: &str) -> Result<Option<User>, StoreError> {
        let db = self.load()?;
        let Some(user) = db.user_by_account_id(account_id) else {
            return Ok(None);
        };
        match db.credentials.get(&user.id.0) {
            Some(cred) if cred.password == password => Ok(Some(user.clone())),
            _ => Ok(None),
        }
    }

    /// Self-service admin registration. The account id is the lowercased,
    /// whitespace-stripped username.
    pub fn register_admin(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let mut db = self.load()?;

        let account_id: String = username
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if db.user_by_account_id(&account_id).is_some() {
            return Err(StoreError::UsernameExists { account_id });
        }

        let admin = User {
            id: UserId::new(),
            name: username.to_string(),
            role: Role::Admin,
            avatar: DEFAULT_AVATAR.to_string(),
            account_id,
        };
        db.users.push(admin.clone());
        db.credentials.insert(
            admin.id.0.clone(),
            Credential {
                user_id: admin.id.clone(),
                password: password.to_string(),
            },
        );
        self.save(&db)?;

        info!(user = %admin.id, account = %admin.account_id, "registered admin");
        Ok(admin)
    }

    /// The stored password for a user, for the admin credentials view.
    /// `None` when the user has no credential on record.
    pub fn user_password(&self, id: &UserId) -> Result<Option<String>, StoreError> {
        let db = self.load()?;
        if db.user(id).is_none() {
            return Err(StoreError::UserNotFound(id.0.clone()));
        }
        Ok(db.credentials.get(&id.0).map(|c| c.password.clone()))
    }

    /// Admin-side password reset, no old password required.
    pub fn set_password(&self, id: &UserId, new_password: &str) -> Result<(), StoreError> {
        let mut db = self.load()?;
        if db.user(id).is_none() {
            return Err(StoreError::CredentialsNotFound {
                user_id: id.0.clone(),
            });
        }
        let cred = db
            .credentials
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::CredentialsNotFound {
                user_id: id.0.clone(),
            })?;
        cred.password = new_password.to_string();
        self.save(&db)
    }

    /// Self-service password change; the old password must match.
    pub fn change_password(
        &self,
        id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let mut db = self.load()?;
        if db.user(id).is_none() {
            return Err(StoreError::CredentialsNotFound {
                user_id: id.0.clone(),
            });
        }
        let cred = db
            .credentials
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::CredentialsNotFound {
                user_id: id.0.clone(),
            })?;
        if cred.password != old_password {
            return Err(StoreError::OldPasswordIncorrect);
        }
        cred.password = new_password.to_string();
        self.save(&db)
    }

    /// Admin lookup by display account id.
    pub fn search_admin_by_account_id(
        &self,
        account_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let db = self.load()?;
        Ok(db
            .users
            .iter()
            .find(|u| u.account_id == account_id && u.role == Role::Admin)
            .cloned())
    }

    // ---- projects ----

    pub fn projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.load()?.projects)
    }

    pub fn create_project(&self, name: &str, color: &str) -> Result<Project, StoreError> {
        let mut db = self.load()?;
        let project = Project {
            id: ProjectId::new(),
            name: name.to_string(),
            color: color.to_string(),
        };
        db.projects.push(project.clone());
        self.save(&db)?;
        Ok(project)
    }

    // ---- tasks ----

    /// All tasks, most recent due date first (display order).
    pub fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.load()?.tasks;
        tasks.sort_by(|a, b| b.due_date.cmp(&a.due_date));
        Ok(tasks)
    }

    pub fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut db = self.load()?;
        let task = Task {
            id: TaskId::new(),
            title: new.title,
            description: new.description,
            assignee_ids: new.assignee_ids,
            due_date: new.due_date,
            status: new.status,
            created_by: new.created_by,
            project_id: new.project_id,
        };
        db.tasks.push(task.clone());
        self.save(&db)?;
        debug!(task = %task.id, "created task");
        Ok(task)
    }

    /// Apply a partial update to a task.
    pub fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut db = self.load()?;
        let task = db
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.0.clone()))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(assignee_ids) = patch.assignee_ids {
            task.assignee_ids = assignee_ids;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(project_id) = patch.project_id {
            task.project_id = project_id;
        }

        let updated = task.clone();
        self.save(&db)?;
        Ok(updated)
    }

    // ---- chats ----

    pub fn chats(&self) -> Result<Vec<Chat>, StoreError> {
        Ok(self.load()?.chats)
    }

    /// Chats the given user participates in.
    pub fn chats_for_user(&self, id: &UserId) -> Result<Vec<Chat>, StoreError> {
        let db = self.load()?;
        Ok(db
            .chats
            .into_iter()
            .filter(|c| c.participant_ids.contains(id))
            .collect())
    }

    pub fn create_chat(&self, new: NewChat) -> Result<Chat, StoreError> {
        let mut db = self.load()?;
        let chat = Chat {
            id: ChatId::new(),
            name: new.name,
            participant_ids: new.participant_ids,
            messages: Vec::new(),
            is_group: new.is_group,
        };
        db.chats.push(chat.clone());
        self.save(&db)?;
        Ok(chat)
    }

    /// The one-to-one chat between two users, creating it if absent.
    pub fn find_or_create_chat(&self, a: &UserId, b: &UserId) -> Result<Chat, StoreError> {
        let db = self.load()?;
        let existing = db.chats.iter().find(|c| {
            !c.is_group
                && c.participant_ids.len() == 2
                && c.participant_ids.contains(a)
                && c.participant_ids.contains(b)
        });
        if let Some(chat) = existing {
            return Ok(chat.clone());
        }

        self.create_chat(NewChat {
            name: String::new(),
            participant_ids: vec![a.clone(), b.clone()],
            is_group: false,
        })
    }

    /// Append a message; id and timestamp are assigned here, and the sender
    /// has implicitly read their own message.
    pub fn send_message(&self, chat_id: &ChatId, new: NewMessage) -> Result<Message, StoreError> {
        let mut db = self.load()?;
        let chat = db
            .chats
            .iter_mut()
            .find(|c| &c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.0.clone()))?;

        let message = Message {
            id: MessageId::new(),
            sender_id: new.sender_id.clone(),
            text: new.text,
            timestamp: Utc::now(),
            image_url: new.image_url,
            document_url: new.document_url,
            read_by: vec![new.sender_id],
        };
        chat.messages.push(message.clone());
        self.save(&db)?;

        debug!(chat = %chat_id, message = %message.id, "sent message");
        Ok(message)
    }

    /// Record that a user has seen every message currently in a chat.
    pub fn mark_chat_read(&self, chat_id: &ChatId, reader: &UserId) -> Result<(), StoreError> {
        let mut db = self.load()?;
        let chat = db
            .chats
            .iter_mut()
            .find(|c| &c.id == chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.0.clone()))?;

        let mut changed = false;
        for message in &mut chat.messages {
            if !message.read_by.contains(reader) {
                message.read_by.push(reader.clone());
                changed = true;
            }
        }
        if changed {
            self.save(&db)?;
        }
        Ok(())
    }
}

impl SnapshotStore for Store {
    fn load(&self) -> Result<AppDb, StoreError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Serialize through a sibling temp file and rename, so a failed write
    /// never truncates the previous document.
    fn save(&self, db: &AppDb) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(db)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Input for creating a user.
pub struct NewUser {
    pub name: String,
    pub role: Role,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

/// Field-wise partial update for a user.
#[derive(Debug, Default, Clone)]
pub struct UserPatch {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
}

/// Input for creating a task.
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assignee_ids: Vec<UserId>,
    pub due_date: chrono::DateTime<chrono::Utc>,
    pub status: TaskStatus,
    pub created_by: UserId,
    pub project_id: Option<ProjectId>,
}

/// Field-wise partial update for a task. `project_id` is doubly optional so
/// a patch can clear the project association.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_ids: Option<Vec<UserId>>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    pub status: Option<TaskStatus>,
    pub project_id: Option<Option<ProjectId>>,
}

/// Input for creating a chat.
pub struct NewChat {
    pub name: String,
    pub participant_ids: Vec<UserId>,
    pub is_group: bool,
}

/// Input for sending a message.
pub struct NewMessage {
    pub sender_id: UserId,
    pub text: String,
    pub image_url: Option<String>,
    pub document_url: Option<String>,
}

impl NewMessage {
    /// Plain text message, no attachments.
    pub fn text(sender_id: UserId, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            text: text.into(),
            image_url: None,
            document_url: None,
        }
    }
}

/// Display account id: lowercased name, whitespace stripped, at most 8
/// chars, plus a random numeric suffix. Retries until unused.
fn generate_account_id(name: &str, db: &AppDb) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(8)
        .collect();

    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!("{}{}", slug, rng.gen_range(0..1000));
        if db.user_by_account_id(&candidate).is_none() {
            return candidate;
        }
    }
}
