//! Process-wide authentication context: the two tokens and the current user.
//!
//! The transport reads the access token for every call and tears the session down on any 401.
//! Tokens survive restarts through a [`SessionStore`]; the user is always re-fetched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use approvly_core::domain::user::{TokenResponse, User};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not access session file `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("session file `{path}` is corrupt: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },
}

/// Persisted form of the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredTokens>, SessionError>;
    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    tokens: Mutex<Option<StoredTokens>>,
}

impl InMemorySessionStore {
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            tokens: Mutex::new(Some(StoredTokens {
                access: access.to_string(),
                refresh: refresh.to_string(),
            })),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<Option<StoredTokens>, SessionError> {
        Ok(self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone())
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError> {
        *self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// JSON file holding both tokens.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io { path: self.path.clone(), source }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<StoredTokens>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SessionError::Decode { path: self.path.clone(), source })
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let raw = serde_json::to_string_pretty(tokens)
            .map_err(|source| SessionError::Decode { path: self.path.clone(), source })?;
        fs::write(&self.path, raw).map_err(|source| self.io_error(source))
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }
}

#[derive(Default)]
struct SessionState {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
    user: Option<User>,
}

pub struct Session {
    store: Arc<dyn SessionStore>,
    state: RwLock<SessionState>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Session")
            .field("authenticated", &state.access.is_some())
            .field("user", &state.user.as_ref().map(|user| user.username.as_str()))
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store, state: RwLock::new(SessionState::default()) }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::default()))
    }

    /// Loads persisted tokens. Returns whether a token was found.
    pub fn init(&self) -> Result<bool, SessionError> {
        let Some(tokens) = self.store.load()? else {
            return Ok(false);
        };
        let mut state = self.write();
        state.access = Some(tokens.access.into());
        state.refresh = Some(tokens.refresh.into());
        Ok(true)
    }

    pub fn establish(&self, tokens: TokenResponse) -> Result<(), SessionError> {
        self.store.save(&StoredTokens {
            access: tokens.access.clone(),
            refresh: tokens.refresh.clone(),
        })?;

        let mut state = self.write();
        state.access = Some(tokens.access.into());
        state.refresh = Some(tokens.refresh.into());
        info!(
            event_name = "client.session.established",
            user_id = tokens.user.id.0,
            role = tokens.user.role.as_str(),
            "session established"
        );
        state.user = Some(tokens.user);
        Ok(())
    }

    pub fn set_user(&self, user: User) {
        self.write().user = Some(user);
    }

    /// Drops tokens and user, in memory and on disk. Never fails; a store error is logged.
    pub fn teardown(&self) {
        {
            let mut state = self.write();
            *state = SessionState::default();
        }
        if let Err(error) = self.store.clear() {
            warn!(
                event_name = "client.session.clear_failed",
                error = %error,
                "failed to clear persisted session"
            );
        }
        info!(event_name = "client.session.cleared", "session cleared");
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.read().access.clone()
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read().refresh.clone()
    }

    pub(crate) fn bearer(&self) -> Option<String> {
        self.read().access.as_ref().map(|token| format!("Bearer {}", token.expose_secret()))
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().access.is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approvly_core::domain::user::{TokenResponse, User, UserGrade, UserId, UserRole};
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{FileSessionStore, InMemorySessionStore, Session, SessionStore};

    fn tokens() -> TokenResponse {
        TokenResponse {
            access: "access-1".to_string(),
            refresh: "refresh-1".to_string(),
            user: User {
                id: UserId(3),
                username: "mia".to_string(),
                email: None,
                role: UserRole::Manager,
                grade: UserGrade::Grade2,
                created_at: None,
                updated_at: None,
            },
        }
    }

    #[test]
    fn establish_persists_and_teardown_clears() {
        let store = Arc::new(InMemorySessionStore::default());
        let session = Session::new(store.clone());

        session.establish(tokens()).expect("establish");
        assert_eq!(session.bearer().as_deref(), Some("Bearer access-1"));
        assert_eq!(session.current_user().map(|user| user.id), Some(UserId(3)));
        assert!(store.load().expect("load").is_some());

        session.teardown();
        assert!(!session.is_authenticated());
        assert!(session.current_user().is_none());
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn init_restores_tokens_without_user() {
        let session = Session::new(Arc::new(InMemorySessionStore::with_tokens("a", "r")));

        assert!(session.init().expect("init"));
        assert_eq!(
            session.refresh_token().map(|token| token.expose_secret().to_string()),
            Some("r".to_string())
        );
        assert!(session.current_user().is_none());
    }

    #[test]
    fn debug_output_never_contains_tokens() {
        let session = Session::in_memory();
        session.establish(tokens()).expect("establish");

        let rendered = format!("{session:?}");
        assert!(!rendered.contains("access-1"));
        assert!(rendered.contains("mia"));
    }

    #[test]
    fn file_store_round_trips_and_clear_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().expect("empty load").is_none());
        let session = Session::new(Arc::new(store.clone()));
        session.establish(tokens()).expect("establish");

        let restored = Session::new(Arc::new(store.clone()));
        assert!(restored.init().expect("init"));
        assert_eq!(restored.bearer().as_deref(), Some("Bearer access-1"));

        store.clear().expect("clear");
        store.clear().expect("second clear");
        assert!(!store.path().exists());
    }
}
