//! `rolesync diff <roster.csv>` — preview the change-set without mutating.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rolesync_core::{source, Action, ChangePlan, RoleChange, RosterSummary};
use rolesync_sync::{pipeline::plan_cycle, ReconcileRequest};

use super::{connect, explain, write_request};
use crate::{DuplicatesArg, TokenArgs};

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Roster snapshot with `username` and `status` columns.
    pub csv: PathBuf,

    #[command(flatten)]
    pub token: TokenArgs,

    /// How to treat a member listed more than once: independent, last-wins.
    #[arg(long, default_value_t = DuplicatesArg::default())]
    pub duplicates: DuplicatesArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Write the change-set as a request file for `rolesync apply --changes`.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Serialize)]
struct DiffJson<'a> {
    roster: RosterSummary,
    changes: &'a [RoleChange],
    unmatched: &'a [String],
    duplicates: &'a [String],
}

#[derive(Tabled)]
pub(crate) struct ChangeRow {
    #[tabled(rename = "username")]
    username: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "role")]
    role: String,
}

impl ChangeRow {
    pub(crate) fn new(change: &RoleChange) -> Self {
        Self {
            username: change.display_name.clone(),
            action: action_label(change.action),
            role: change.role.to_string(),
        }
    }
}

pub(crate) fn action_label(action: Action) -> String {
    match action {
        Action::Add => "add".green().to_string(),
        Action::Remove => "remove".red().to_string(),
    }
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let desired = source::read_desired_file(&self.csv)
            .with_context(|| format!("failed to read {}", self.csv.display()))?;
        let session = connect(&self.token)?;
        let (roster, plan) = plan_cycle(
            &session.api,
            &session.config,
            &session.credential,
            &desired,
            self.duplicates.0,
        )
        .map_err(explain)?;
        let summary = RosterSummary::of(&roster);

        if let Some(out) = self.out.as_ref() {
            write_request(out, &ReconcileRequest::from_changes(&plan.changes))?;
        }

        if self.json {
            return print_plan_json(summary, &plan);
        }

        print_plan(&plan);
        if let Some(out) = self.out.as_ref() {
            println!("  Request written to: {}", out.display());
        }
        Ok(())
    }
}

pub(crate) fn print_plan_json(roster: RosterSummary, plan: &ChangePlan) -> Result<()> {
    let payload = DiffJson {
        roster,
        changes: &plan.changes,
        unmatched: &plan.unmatched,
        duplicates: &plan.duplicates,
    };
    let json = serde_json::to_string_pretty(&payload).context("failed to serialize diff")?;
    println!("{json}");
    Ok(())
}

pub(crate) fn print_plan(plan: &ChangePlan) {
    for name in &plan.unmatched {
        eprintln!("{} member '{}' not found", "warning:".yellow().bold(), name);
    }
    for name in &plan.duplicates {
        eprintln!("{} member '{}' listed more than once", "warning:".yellow().bold(), name);
    }

    if plan.changes.is_empty() {
        println!("{} Roles already match the roster.", "✓".green());
        return;
    }

    let rows: Vec<ChangeRow> = plan.changes.iter().map(ChangeRow::new).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{} role changes", plan.changes.len().to_string().bold());
}
