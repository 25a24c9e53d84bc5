//! Process-wide API key storage.

use std::sync::RwLock;

/// The single credential the agent needs, seeded from the environment and
/// writable from the UI. Shared by reference across the process.
pub struct CredentialStore {
    env_var: String,
    value: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Seed the store from `env_var`, if set and non-empty.
    pub fn from_env(env_var: impl Into<String>) -> Self {
        let env_var = env_var.into();
        let value = std::env::var(&env_var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self {
            env_var,
            value: RwLock::new(value),
        }
    }

    /// An empty store; used where the environment must not leak in.
    pub fn empty(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            value: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Store a key entered by the user. Blank input keeps the current value.
    pub fn supply(&self, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let mut guard = match self.value.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(key.to_string());
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        match self.value.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("env_var", &self.env_var)
            .field("present", &self.is_present())
            .finish()
    }
}
