//! `rolesync members` — live roster with role counts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rolesync_core::{Member, RosterSummary};
use rolesync_sync::fetch_all_members;

use super::{connect, explain};
use crate::TokenArgs;

#[derive(Args, Debug)]
pub struct MembersArgs {
    #[command(flatten)]
    pub token: TokenArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct MembersJson<'a> {
    summary: RosterSummary,
    members: &'a [Member],
}

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "username")]
    username: String,
    #[tabled(rename = "current")]
    current: String,
    #[tabled(rename = "former")]
    former: String,
}

impl MembersArgs {
    pub fn run(self) -> Result<()> {
        let session = connect(&self.token)?;
        let members = fetch_all_members(
            &session.api,
            &session.credential,
            &session.config.roles,
            session.config.page_size,
        )
        .map_err(explain)?;
        let summary = RosterSummary::of(&members);

        if self.json {
            let payload = MembersJson {
                summary,
                members: &members,
            };
            let json = serde_json::to_string_pretty(&payload).context("failed to serialize roster")?;
            println!("{json}");
            return Ok(());
        }

        if members.is_empty() {
            println!("No members in guild '{}'.", session.config.guild_id);
            return Ok(());
        }

        let rows: Vec<MemberRow> = members
            .iter()
            .map(|m| MemberRow {
                id: m.id.to_string(),
                username: m.display_name.clone(),
                current: mark(m.roles.is_current),
                former: mark(m.roles.is_former),
            })
            .collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
        println!(
            "{} members, {} current, {} former",
            summary.total.to_string().bold(),
            summary.current.to_string().green(),
            summary.former.to_string().yellow()
        );
        Ok(())
    }
}

fn mark(flag: bool) -> String {
    if flag {
        "✓".green().to_string()
    } else {
        String::new()
    }
}
