//! Change applicator.
//!
//! Issues one idempotent grant/revoke per [`RoleChange`] and records an
//! [`ApplyOutcome`] for each, in input order. A failed mutation never aborts
//! the batch; only a rejected credential stops it, and only before the first
//! mutation. No rollback and no retries.

use rayon::prelude::*;

use rolesync_core::{Action, ApplyOutcome, RoleChange, RoleMap};

use crate::api::MemberApi;
use crate::credential::Credential;
use crate::error::{ApiError, ReconcileError};

/// Detail recorded when no response was received.
pub const TRANSPORT_FAILURE: &str = "Failed to update role";

pub struct ChangeApplicator<'a, A: MemberApi + ?Sized> {
    api: &'a A,
    roles: &'a RoleMap,
    concurrency: usize,
}

impl<'a, A: MemberApi + ?Sized> ChangeApplicator<'a, A> {
    /// Sequential applicator.
    pub fn new(api: &'a A, roles: &'a RoleMap) -> Self {
        Self {
            api,
            roles,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` mutations in flight. `0` is treated as `1`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Apply every change. The result has the same length and order as `changes`.
    pub fn apply(
        &self,
        changes: &[RoleChange],
        credential: &Credential,
    ) -> Result<Vec<ApplyOutcome>, ReconcileError> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }
        match self.api.verify_credential(credential) {
            Ok(()) => {}
            Err(err @ ApiError::Status { status: 401 | 403, .. }) => return Err(err.into()),
            // Only a rejected credential stops the batch; mutations report their own failures.
            Err(err) => tracing::warn!(error = %err, "credential probe failed, applying anyway"),
        }

        let outcomes = if self.concurrency > 1 && changes.len() > 1 {
            self.apply_concurrent(changes, credential)
        } else {
            changes
                .iter()
                .map(|change| self.apply_one(change, credential))
                .collect()
        };

        let failed = outcomes.iter().filter(|o| !o.success).count();
        tracing::info!(
            total = outcomes.len(),
            failed,
            concurrency = self.concurrency,
            "change-set applied"
        );
        Ok(outcomes)
    }

    fn apply_concurrent(&self, changes: &[RoleChange], credential: &Credential) -> Vec<ApplyOutcome> {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            // Indexed collect keeps input order.
            Ok(pool) => pool.install(|| {
                changes
                    .par_iter()
                    .map(|change| self.apply_one(change, credential))
                    .collect()
            }),
            Err(err) => {
                tracing::warn!(error = %err, "thread pool unavailable, applying sequentially");
                changes
                    .iter()
                    .map(|change| self.apply_one(change, credential))
                    .collect()
            }
        }
    }

    /// Apply a single change, converting every failure into data.
    pub fn apply_one(&self, change: &RoleChange, credential: &Credential) -> ApplyOutcome {
        let role_id = self.roles.role_id(change.role);
        let result = match change.action {
            Action::Add => self.api.add_role(credential, &change.member_id, role_id),
            Action::Remove => self.api.remove_role(credential, &change.member_id, role_id),
        };

        match result {
            Ok(status) => {
                tracing::debug!(
                    member = %change.member_id,
                    role = %change.role,
                    action = %change.action,
                    status,
                    "role mutation applied"
                );
                ApplyOutcome::succeeded(change.member_id.clone(), status)
            }
            Err(err @ ApiError::Status { .. }) => {
                tracing::warn!(
                    member = %change.member_id,
                    role = %change.role,
                    action = %change.action,
                    error = %err,
                    "role mutation rejected"
                );
                let detail = err.message().unwrap_or_else(|| err.to_string());
                ApplyOutcome::failed(change.member_id.clone(), err.status(), detail)
            }
            Err(err) => {
                tracing::warn!(
                    member = %change.member_id,
                    role = %change.role,
                    action = %change.action,
                    error = %err,
                    "role mutation failed"
                );
                ApplyOutcome::failed(change.member_id.clone(), None, TRANSPORT_FAILURE)
            }
        }
    }
}
