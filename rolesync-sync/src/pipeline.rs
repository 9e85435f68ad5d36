//! One reconciliation cycle: fetch → diff → apply → re-fetch.
//!
//! This is the canonical entrypoint for `rolesync apply`; `rolesync diff`
//! runs the same cycle with `dry_run` set.

use chrono::{DateTime, Utc};

use rolesync_core::{
    plan_changes, ApplyOutcome, ChangePlan, DesiredRecord, DuplicatePolicy, Member,
    RosterSummary, ServiceConfig,
};

use crate::api::MemberApi;
use crate::apply::ChangeApplicator;
use crate::credential::Credential;
use crate::error::ReconcileError;
use crate::roster::fetch_all_members;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Compute the plan without issuing any mutation.
    pub dry_run: bool,
    pub duplicates: DuplicatePolicy,
}

/// Everything one cycle observed and did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub plan: ChangePlan,
    /// `outcomes[i]` answers `plan.changes[i]`. Empty on dry-run.
    pub outcomes: Vec<ApplyOutcome>,
    pub before: RosterSummary,
    /// Ground truth re-fetched after applying; `None` when nothing was issued
    /// or the re-fetch failed.
    pub after: Option<RosterSummary>,
    /// Why the post-apply re-fetch failed. The outcomes above still stand.
    pub refetch_error: Option<String>,
}

impl CycleReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Fetch the roster and compute the plan. No mutations.
pub fn plan_cycle<A: MemberApi + ?Sized>(
    api: &A,
    config: &ServiceConfig,
    credential: &Credential,
    desired: &[DesiredRecord],
    duplicates: DuplicatePolicy,
) -> Result<(Vec<Member>, ChangePlan), ReconcileError> {
    let roster = fetch_all_members(api, credential, &config.roles, config.page_size)?;
    let plan = plan_changes(&roster, desired, duplicates);

    for name in &plan.unmatched {
        tracing::warn!(name = %name, "member not found");
    }
    for name in &plan.duplicates {
        tracing::warn!(name = %name, policy = ?duplicates, "member listed more than once");
    }
    if plan.skipped_blank > 0 {
        tracing::debug!(rows = plan.skipped_blank, "skipped rows without a username");
    }
    tracing::info!(changes = plan.changes.len(), "change-set computed");
    Ok((roster, plan))
}

/// Run a full cycle.
pub fn run_cycle<A: MemberApi + ?Sized>(
    api: &A,
    config: &ServiceConfig,
    credential: &Credential,
    desired: &[DesiredRecord],
    options: CycleOptions,
) -> Result<CycleReport, ReconcileError> {
    let started_at = Utc::now();
    let (roster, plan) = plan_cycle(api, config, credential, desired, options.duplicates)?;
    let before = RosterSummary::of(&roster);
    drop(roster);

    if options.dry_run || plan.is_empty() {
        return Ok(CycleReport {
            started_at,
            plan,
            outcomes: Vec::new(),
            before,
            after: None,
            refetch_error: None,
        });
    }

    let outcomes = ChangeApplicator::new(api, &config.roles)
        .with_concurrency(config.concurrency)
        .apply(&plan.changes, credential)?;

    // Mutations are already issued; a failed re-fetch must not discard their outcomes.
    let (after, refetch_error) = match refetch_summary(api, config, credential) {
        Ok(summary) => (Some(summary), None),
        Err(err) => (None, Some(err.to_string())),
    };
    Ok(CycleReport {
        started_at,
        plan,
        outcomes,
        before,
        after,
        refetch_error,
    })
}

/// Re-read the roster after a batch and summarize it.
pub fn refetch_summary<A: MemberApi + ?Sized>(
    api: &A,
    config: &ServiceConfig,
    credential: &Credential,
) -> Result<RosterSummary, ReconcileError> {
    fetch_all_members(api, credential, &config.roles, config.page_size)
        .map(|members| RosterSummary::of(&members))
        .map_err(|err| {
            tracing::warn!(error = %err, "post-apply roster re-fetch failed");
            err
        })
}
