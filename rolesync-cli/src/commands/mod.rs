pub mod apply;
pub mod diff;
pub mod init;
pub mod members;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rolesync_core::{config, ServiceConfig};
use rolesync_sync::{Credential, HttpMemberApi, ReconcileError, ReconcileRequest};

use crate::TokenArgs;

/// Config, HTTP client and credential for one command invocation.
pub struct Session {
    pub config: ServiceConfig,
    pub api: HttpMemberApi,
    pub credential: Credential,
}

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub fn load_config() -> Result<ServiceConfig> {
    config::load().context("failed to load config")
}

pub fn connect(token: &TokenArgs) -> Result<Session> {
    let config = load_config()?;
    tracing::debug!(guild = %config.guild_id, api_base = %config.api_base, "config loaded");
    let credential = Credential::new(token.token.clone().unwrap_or_default())
        .map_err(explain)
        .context("pass --token or set ROLESYNC_TOKEN")?;
    let api = HttpMemberApi::new(&config);
    Ok(Session {
        config,
        api,
        credential,
    })
}

/// Attach operator guidance to fatal reconciliation errors.
pub fn explain(err: ReconcileError) -> anyhow::Error {
    let hint = match &err {
        ReconcileError::Auth { .. } => "re-authenticate and retry with a fresh token",
        ReconcileError::Upstream { .. } => "no role changes were issued; retry the command",
        ReconcileError::Config(_) => "fix ~/.rolesync/config.yaml or rerun `rolesync init`",
    };
    anyhow::Error::new(err).context(hint)
}

pub fn read_request(path: &Path) -> Result<ReconcileRequest> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a change request", path.display()))
}

pub fn write_request(path: &Path, request: &ReconcileRequest) -> Result<()> {
    let json = serde_json::to_string_pretty(request).context("failed to serialize request")?;
    std::fs::write(path, json + "\n").with_context(|| format!("write {}", path.display()))
}
