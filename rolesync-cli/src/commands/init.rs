//! `rolesync init --guild <id> --current-role <id> --former-role <id>`

use anyhow::{bail, Context, Result};
use clap::Args;

use rolesync_core::{config, RoleMap, ServiceConfig};

use super::home;

/// Write the service configuration.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Guild whose roster is reconciled.
    #[arg(long)]
    pub guild: String,

    /// Role id of the "Current Member" role.
    #[arg(long)]
    pub current_role: String,

    /// Role id of the "Former Member" role.
    #[arg(long)]
    pub former_role: String,

    /// Base URL of the remote API.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Authorization scheme placed before the token (e.g. Bot, Bearer).
    #[arg(long)]
    pub auth_scheme: Option<String>,

    /// Roster page size (1-1000).
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Maximum concurrent role mutations during apply.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = config::config_path_at(&home()?);
        if path.exists() && !self.force {
            bail!(
                "config already exists at {}; pass --force to overwrite",
                path.display()
            );
        }

        let mut cfg = ServiceConfig::new(
            self.guild,
            RoleMap::new(self.current_role, self.former_role),
        );
        if let Some(api_base) = self.api_base {
            cfg.api_base = api_base;
        }
        if let Some(scheme) = self.auth_scheme {
            cfg.auth_scheme = scheme;
        }
        if let Some(page_size) = self.page_size {
            cfg.page_size = page_size;
        }
        if let Some(concurrency) = self.concurrency {
            cfg.concurrency = concurrency;
        }

        let saved = config::save(&cfg).context("failed to write config")?;
        println!("✓ Configured guild '{}'", cfg.guild_id);
        println!("  Saved to: {}", saved.display());
        Ok(())
    }
}
