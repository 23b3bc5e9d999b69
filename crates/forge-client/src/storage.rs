//! Key-value persistence for session data.
//!
//! Storage is best effort: a store that cannot be read behaves as empty and
//! a failed write is logged and otherwise ignored. Nothing in the client
//! blocks on storage being available.
//!
//! Keys:
//! - `forge.auth_token` - bearer token for the primary backend
//! - `forge.user.<wallet>` - user pairing for a wallet (JSON [`User`])
//! - `forge.chat.<project>` - chat transcript (JSON array of [`ChatMessage`])
//! - `forge.code.<project>` - last generated source
//! - `forge.current_project` - id of the project in focus
//! - `forge.projects` - the project collection (JSON array of [`Project`])

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use forge_core::{Project, ProjectId, User, WalletAddress};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const AUTH_TOKEN_KEY: &str = "forge.auth_token";
pub const CURRENT_PROJECT_KEY: &str = "forge.current_project";
pub const PROJECTS_KEY: &str = "forge.projects";

/// Synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// File Store
// ============================================================================

/// Store backed by a single JSON object on disk, written through on
/// every change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::read_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "Opened store");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> BTreeMap<String, String> {
        if !path.exists() {
            return BTreeMap::new();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read store, starting empty");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Failed to parse store, starting empty");
            BTreeMap::new()
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create store directory");
                return;
            }
        }
        let result = serde_json::to_string_pretty(entries)
            .map_err(std::io::Error::from)
            .and_then(|content| fs::write(&self.path, content));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Failed to write store");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.write_entries(&entries);
        }
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store, used for tests and `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}

// ============================================================================
// Typed Helpers
// ============================================================================

fn user_key(wallet: &WalletAddress) -> String {
    format!("forge.user.{wallet}")
}

fn chat_key(project: &ProjectId) -> String {
    format!("forge.chat.{project}")
}

fn code_key(project: &ProjectId) -> String {
    format!("forge.code.{project}")
}

pub fn auth_token(store: &dyn KeyValueStore) -> Option<String> {
    store.get(AUTH_TOKEN_KEY).filter(|token| !token.is_empty())
}

pub fn set_auth_token(store: &dyn KeyValueStore, token: &str) {
    store.set(AUTH_TOKEN_KEY, token);
}

pub fn clear_auth_token(store: &dyn KeyValueStore) {
    store.remove(AUTH_TOKEN_KEY);
}

/// Loads the stored user pairing for `wallet`, if any.
pub fn load_user(store: &dyn KeyValueStore, wallet: &WalletAddress) -> Option<User> {
    let raw = store.get(&user_key(wallet))?;
    match serde_json::from_str::<User>(&raw) {
        Ok(user) if &user.wallet_address == wallet => Some(user),
        Ok(_) => None,
        Err(e) => {
            warn!(wallet = %wallet, error = %e, "Ignoring corrupt user pairing");
            None
        }
    }
}

pub fn save_user(store: &dyn KeyValueStore, user: &User) {
    match serde_json::to_string(user) {
        Ok(raw) => store.set(&user_key(&user.wallet_address), &raw),
        Err(e) => warn!(error = %e, "Failed to encode user pairing"),
    }
}

pub fn forget_user(store: &dyn KeyValueStore, wallet: &WalletAddress) {
    store.remove(&user_key(wallet));
}

pub fn current_project(store: &dyn KeyValueStore) -> Option<ProjectId> {
    store.get(CURRENT_PROJECT_KEY).map(ProjectId::new)
}

pub fn set_current_project(store: &dyn KeyValueStore, id: &ProjectId) {
    store.set(CURRENT_PROJECT_KEY, id.as_str());
}

pub fn clear_current_project(store: &dyn KeyValueStore) {
    store.remove(CURRENT_PROJECT_KEY);
}

pub fn load_code(store: &dyn KeyValueStore, project: &ProjectId) -> Option<String> {
    store.get(&code_key(project))
}

pub fn save_code(store: &dyn KeyValueStore, project: &ProjectId, code: &str) {
    store.set(&code_key(project), code);
}

/// Loads the saved project collection. A corrupt entry reads as empty.
pub fn load_projects(store: &dyn KeyValueStore) -> Vec<Project> {
    let Some(raw) = store.get(PROJECTS_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(projects) => projects,
        Err(e) => {
            warn!(error = %e, "Ignoring corrupt project collection");
            Vec::new()
        }
    }
}

pub fn save_projects(store: &dyn KeyValueStore, projects: &[Project]) {
    match serde_json::to_string(projects) {
        Ok(raw) => store.set(PROJECTS_KEY, &raw),
        Err(e) => warn!(error = %e, "Failed to encode project collection"),
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of a project's chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

pub fn chat_transcript(store: &dyn KeyValueStore, project: &ProjectId) -> Vec<ChatMessage> {
    store
        .get(&chat_key(project))
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn append_chat(store: &dyn KeyValueStore, project: &ProjectId, message: ChatMessage) {
    let mut transcript = chat_transcript(store, project);
    transcript.push(message);
    match serde_json::to_string(&transcript) {
        Ok(raw) => store.set(&chat_key(project), &raw),
        Err(e) => warn!(project = %project, error = %e, "Failed to encode chat transcript"),
    }
}

/// Removes everything stored for `project`.
pub fn forget_project(store: &dyn KeyValueStore, project: &ProjectId) {
    store.remove(&chat_key(project));
    store.remove(&code_key(project));
    if current_project(store).as_ref() == Some(project) {
        clear_current_project(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::UserId;
    use tempfile::TempDir;

    fn wallet(raw: &str) -> WalletAddress {
        WalletAddress::parse(raw).unwrap()
    }

    #[test]
    fn test_file_store_persists_across_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path);
        store.set("a", "1");
        store.set("b", "2");
        store.remove("b");

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("a").as_deref(), Some("1"));
        assert!(reopened.get("b").is_none());
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get("anything").is_none());
        store.set("k", "v");
        assert_eq!(FileStore::open(&path).get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_user_pairing_is_per_wallet() {
        let store = MemoryStore::new();
        let user = User {
            id: UserId::new("u-1"),
            wallet_address: wallet("wallet-a"),
        };
        save_user(&store, &user);

        assert_eq!(load_user(&store, &wallet("wallet-a")), Some(user));
        assert!(load_user(&store, &wallet("wallet-b")).is_none());

        forget_user(&store, &wallet("wallet-a"));
        assert!(load_user(&store, &wallet("wallet-a")).is_none());
    }

    #[test]
    fn test_auth_token_roundtrip_and_empty_is_none() {
        let store = MemoryStore::new();
        assert!(auth_token(&store).is_none());
        set_auth_token(&store, "");
        assert!(auth_token(&store).is_none());
        set_auth_token(&store, "tok");
        assert_eq!(auth_token(&store).as_deref(), Some("tok"));
        clear_auth_token(&store);
        assert!(auth_token(&store).is_none());
    }

    #[test]
    fn test_chat_transcript_appends_in_order() {
        let store = MemoryStore::new();
        let project = ProjectId::new("p-1");
        append_chat(&store, &project, ChatMessage::new(ChatRole::User, "make a token"));
        append_chat(&store, &project, ChatMessage::new(ChatRole::Assistant, "done"));

        let transcript = chat_transcript(&store, &project);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[1].content, "done");
    }

    #[test]
    fn test_forget_project_clears_pointer() {
        let store = MemoryStore::new();
        let project = ProjectId::new("p-1");
        save_code(&store, &project, "code");
        set_current_project(&store, &project);

        forget_project(&store, &project);
        assert!(load_code(&store, &project).is_none());
        assert!(current_project(&store).is_none());
    }

    #[test]
    fn test_project_collection_roundtrip_and_corrupt_reads_empty() {
        let store = MemoryStore::new();
        assert!(load_projects(&store).is_empty());

        let draft = Project::new(ProjectId::new("p-1"), Some("Escrow".to_string()));
        save_projects(&store, std::slice::from_ref(&draft));
        assert_eq!(load_projects(&store), vec![draft]);

        store.set(PROJECTS_KEY, "[{broken");
        assert!(load_projects(&store).is_empty());
    }
}
