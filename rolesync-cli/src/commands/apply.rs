//! `rolesync apply` — issue role changes and report each outcome.
//!
//! Takes either a roster snapshot (full fetch → diff → apply → re-fetch
//! cycle) or a request file written by `rolesync diff --out` /
//! `--failed-out`. Exits non-zero when any mutation failed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rolesync_core::{source, ApplyOutcome, RosterSummary};
use rolesync_sync::{
    pipeline::{refetch_summary, run_cycle, CycleOptions},
    protocol::handle_request,
    ChangeApplicator, ReconcileRequest, ReconcileResponse,
};

use super::diff::{print_plan, print_plan_json, ChangeRow};
use super::{connect, explain, read_request, write_request};
use crate::{DuplicatesArg, TokenArgs};

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Roster snapshot with `username` and `status` columns.
    #[arg(required_unless_present = "changes", conflicts_with = "changes")]
    pub csv: Option<PathBuf>,

    /// Apply a request file instead of diffing a roster snapshot.
    #[arg(long)]
    pub changes: Option<PathBuf>,

    #[command(flatten)]
    pub token: TokenArgs,

    /// Show what would change without mutating anything.
    #[arg(long)]
    pub dry_run: bool,

    /// How to treat a member listed more than once: independent, last-wins.
    #[arg(long, default_value_t = DuplicatesArg::default())]
    pub duplicates: DuplicatesArg,

    /// Write the failed changes as a request file for a later retry.
    #[arg(long)]
    pub failed_out: Option<PathBuf>,

    /// Emit the `{"results": [...]}` response as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "username")]
    username: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        match self.changes.clone() {
            Some(path) => self.run_request(path),
            None => self.run_snapshot(),
        }
    }

    fn run_snapshot(self) -> Result<()> {
        let csv = self.csv.clone().context("a roster snapshot or --changes is required")?;
        let desired = source::read_desired_file(&csv)
            .with_context(|| format!("failed to read {}", csv.display()))?;
        let session = connect(&self.token)?;
        let options = CycleOptions {
            dry_run: self.dry_run,
            duplicates: self.duplicates.0,
        };
        let report = run_cycle(
            &session.api,
            &session.config,
            &session.credential,
            &desired,
            options,
        )
        .map_err(explain)?;

        if self.dry_run {
            if self.json {
                return print_plan_json(report.before, &report.plan);
            }
            print_plan(&report.plan);
            return Ok(());
        }

        let request = ReconcileRequest::from_changes(&report.plan.changes);
        let response = ReconcileResponse {
            results: report.outcomes,
        };
        self.save_failures(&request, &response)?;
        if let Some(err) = report.refetch_error.as_deref() {
            warn_refetch(err);
        }
        self.finish(&request, &response, Some(report.before), report.after)
    }

    fn run_request(self, path: PathBuf) -> Result<()> {
        let request = read_request(&path)?;

        if self.dry_run {
            print_request(&request);
            return Ok(());
        }

        let session = connect(&self.token)?;
        let applicator = ChangeApplicator::new(&session.api, &session.config.roles)
            .with_concurrency(session.config.concurrency);
        let response =
            handle_request(&applicator, &request, &session.credential).map_err(explain)?;
        self.save_failures(&request, &response)?;

        let issued = request.changes.iter().any(|c| c.validate().is_ok());
        let after = if issued {
            match refetch_summary(&session.api, &session.config, &session.credential) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn_refetch(&err.to_string());
                    None
                }
            }
        } else {
            None
        };
        self.finish(&request, &response, None, after)
    }

    /// Write `--failed-out` as soon as outcomes exist.
    fn save_failures(&self, request: &ReconcileRequest, response: &ReconcileResponse) -> Result<()> {
        match self.failed_out.as_ref() {
            Some(out) if response.failed() > 0 => write_request(out, &response.failed_changes(request)),
            _ => Ok(()),
        }
    }

    fn finish(
        &self,
        request: &ReconcileRequest,
        response: &ReconcileResponse,
        before: Option<RosterSummary>,
        after: Option<RosterSummary>,
    ) -> Result<()> {
        let failed = response.failed();
        if self.json {
            let json =
                serde_json::to_string_pretty(response).context("failed to serialize results")?;
            println!("{json}");
        } else {
            print_outcomes(request, &response.results);
            print_summary(response, before, after);
            if let (Some(out), true) = (self.failed_out.as_ref(), failed > 0) {
                println!("  Failed changes written to: {}", out.display());
            }
        }

        if failed > 0 {
            bail!("{failed} of {} role changes failed", response.results.len());
        }
        Ok(())
    }
}

fn warn_refetch(err: &str) {
    eprintln!(
        "{} changes were applied but the roster could not be re-read: {}",
        "warning:".yellow().bold(),
        err
    );
}

fn print_request(request: &ReconcileRequest) {
    if request.is_empty() {
        println!("{} Request contains no changes.", "✓".green());
        return;
    }
    let mut rows = Vec::with_capacity(request.changes.len());
    for entry in &request.changes {
        match entry.validate() {
            Ok(change) => rows.push(ChangeRow::new(&change)),
            Err(detail) => eprintln!(
                "{} entry for '{}' skipped: {}",
                "warning:".yellow().bold(),
                entry.user_id,
                detail
            ),
        }
    }
    let count = rows.len();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{} role changes (dry run)", count.to_string().bold());
}

fn print_outcomes(request: &ReconcileRequest, outcomes: &[ApplyOutcome]) {
    if outcomes.is_empty() {
        println!("{} Roles already match the roster.", "✓".green());
        return;
    }
    let rows: Vec<OutcomeRow> = request
        .changes
        .iter()
        .zip(outcomes)
        .map(|(change, outcome)| OutcomeRow {
            username: change.username.clone(),
            action: change.action.clone(),
            role: change.role.clone(),
            result: if outcome.success {
                "ok".green().to_string()
            } else {
                "failed".red().to_string()
            },
            status: outcome
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            detail: outcome.error_detail.clone().unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_summary(
    response: &ReconcileResponse,
    before: Option<RosterSummary>,
    after: Option<RosterSummary>,
) {
    if response.results.is_empty() {
        return;
    }
    println!(
        "{} applied, {} failed",
        response.succeeded().to_string().green(),
        response.failed().to_string().red()
    );
    if let Some(before) = before {
        println!("  before: {}", format_summary(before));
    }
    if let Some(after) = after {
        println!("  after:  {}", format_summary(after));
    }
}

fn format_summary(summary: RosterSummary) -> String {
    format!(
        "{} members, {} current, {} former",
        summary.total, summary.current, summary.former
    )
}
