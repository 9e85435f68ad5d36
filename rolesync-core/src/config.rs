//! Service configuration stored as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.rolesync/
//!   config.yaml   (mode 0600, written by `rolesync init`)
//! ```
//!
//! # API pattern
//!
//! Every filesystem function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{GuildId, Role, RoleFlags, RoleId};

/// Largest page the remote roster endpoint will return.
pub const MAX_PAGE_SIZE: usize = 1000;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

// ---------------------------------------------------------------------------
// 1. Role mapping
// ---------------------------------------------------------------------------

/// Fixed two-entry mapping between the tracked [`Role`]s and the remote
/// service's role identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMap {
    pub current: RoleId,
    pub former: RoleId,
}

impl RoleMap {
    pub fn new(current: impl Into<RoleId>, former: impl Into<RoleId>) -> Self {
        Self {
            current: current.into(),
            former: former.into(),
        }
    }

    pub fn role_id(&self, role: Role) -> &RoleId {
        match role {
            Role::Current => &self.current,
            Role::Former => &self.former,
        }
    }

    /// Flags for a member holding `role_ids`.
    pub fn flags_for<S: AsRef<str>>(&self, role_ids: &[S]) -> RoleFlags {
        let holds = |id: &RoleId| role_ids.iter().any(|r| r.as_ref() == id.as_str());
        RoleFlags {
            is_current: holds(&self.current),
            is_former: holds(&self.former),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Service config
// ---------------------------------------------------------------------------

/// Everything needed to talk to the remote membership service.
///
/// The credential is deliberately absent: it is passed into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub guild_id: GuildId,
    /// Authorization scheme prefixed to the credential (`Bot`, `Bearer`).
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum in-flight mutations during apply. `1` is sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub roles: RoleMap,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_auth_scheme() -> String {
    "Bot".to_string()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    /// A config with defaults for everything except the guild and role ids.
    pub fn new(guild_id: impl Into<GuildId>, roles: RoleMap) -> Self {
        Self {
            api_base: default_api_base(),
            guild_id: guild_id.into(),
            auth_scheme: default_auth_scheme(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            roles,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guild_id.0.trim().is_empty() {
            return Err(ConfigError::Invalid("guild_id must not be empty".into()));
        }
        if self.roles.current.0.trim().is_empty() || self.roles.former.0.trim().is_empty() {
            return Err(ConfigError::Invalid("role ids must not be empty".into()));
        }
        if self.roles.current == self.roles.former {
            return Err(ConfigError::Invalid(format!(
                "current and former roles share id {}",
                self.roles.current
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid("api_base must not be empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// `<home>/.rolesync/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".rolesync").join("config.yaml")
}

/// Load and validate the config.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<ServiceConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: ServiceConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ServiceConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config.
///
/// Write flow: validate → serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &ServiceConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let path = config_path_at(home);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &ServiceConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
