use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TokenStoreKind;

const SERVICE_NAME: &str = "seiautomation";

/// Fixed key the session token is stored under.
pub const STORAGE_KEY: &str = "access_token";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Persistence for the single session token.
///
/// The token is an opaque blob: nothing here inspects or validates it.
pub trait TokenStore: Send + Sync {
    /// Last persisted token. Missing or unreadable storage reads as `None`.
    fn read(&self) -> Option<String>;

    /// Persist `token`, replacing whatever was stored before.
    fn write(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;
}

/// Open the store selected in configuration.
///
/// The keychain store writes through to `session.json` in `cache_dir` when the
/// keychain rejects a write, and is replaced by the file store outright when no
/// keychain entry can be created at all.
pub fn open_token_store(kind: TokenStoreKind, cache_dir: PathBuf) -> Box<dyn TokenStore> {
    match kind {
        TokenStoreKind::Keyring => match KeyringTokenStore::new() {
            Ok(keyring) => Box::new(FallbackTokenStore::new(
                Box::new(keyring),
                FileTokenStore::new(cache_dir),
            )),
            Err(e) => {
                warn!(error = %e, "Keychain unavailable, storing token in session file");
                Box::new(FileTokenStore::new(cache_dir))
            }
        },
        TokenStoreKind::File => Box::new(FileTokenStore::new(cache_dir)),
        TokenStoreKind::Memory => Box::new(MemoryTokenStore::default()),
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Token stored in the OS keychain
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        let entry =
            Entry::new(SERVICE_NAME, STORAGE_KEY).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn read(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token from keychain");
                None
            }
        }
    }

    fn write(&self, token: &str) -> Result<()> {
        self.entry
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

// ============================================================================
// Keychain with session-file fallback
// ============================================================================

/// Prefers `primary`; a token the primary store refuses goes to the session
/// file instead. At most one of the two holds a token after a write.
pub struct FallbackTokenStore {
    primary: Box<dyn TokenStore>,
    fallback: FileTokenStore,
}

impl FallbackTokenStore {
    pub fn new(primary: Box<dyn TokenStore>, fallback: FileTokenStore) -> Self {
        Self { primary, fallback }
    }
}

impl TokenStore for FallbackTokenStore {
    fn read(&self) -> Option<String> {
        self.primary.read().or_else(|| self.fallback.read())
    }

    fn write(&self, token: &str) -> Result<()> {
        match self.primary.write(token) {
            Ok(()) => {
                if let Err(e) = self.fallback.clear() {
                    warn!(error = %e, "Failed to remove stale session file");
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Keychain write failed, storing token in session file");
                self.fallback.write(token)?;
                // An older keychain token would shadow the one just written.
                if let Err(e) = self.primary.clear() {
                    debug!(error = %e, "Could not clear keychain entry");
                }
                Ok(())
            }
        }
    }

    fn clear(&self) -> Result<()> {
        let primary = self.primary.clear();
        self.fallback.clear()?;
        if let Err(e) = primary {
            warn!(error = %e, "Failed to remove token from keychain");
        }
        Ok(())
    }
}

// ============================================================================
// JSON file in the cache directory
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    stored_at: DateTime<Utc>,
}

/// Token stored as `session.json` under the cache directory
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    fn load(&self) -> Result<Option<StoredToken>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let stored = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(stored))
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Option<String> {
        match self.load() {
            Ok(stored) => stored.map(|s| s.token),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn write(&self, token: &str) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredToken {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        debug!(?path, "Session token saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

// ============================================================================
// In-process
// ============================================================================

/// Token kept in memory for the lifetime of the process
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn read(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn write(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
