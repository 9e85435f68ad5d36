//! Stable request/response shapes exposed to callers.
//!
//! ```json
//! {"changes": [{"userId": "1", "username": "bob", "role": "Former Member", "action": "add"}]}
//! {"results": [{"userId": "1", "success": true, "status": 204}]}
//! ```
//!
//! Requests are read leniently: an entry with an unknown `action` or `role`
//! fails on its own instead of rejecting the whole request.

use serde::{Deserialize, Serialize};

use rolesync_core::{Action, ApplyOutcome, MemberId, Role, RoleChange};

use crate::apply::ChangeApplicator;
use crate::api::MemberApi;
use crate::credential::Credential;
use crate::error::ReconcileError;

pub const INVALID_ACTION: &str = "Invalid action";
pub const INVALID_ROLE: &str = "Invalid role";

/// One change entry as received on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedChange {
    #[serde(rename = "userId")]
    pub user_id: MemberId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub action: String,
}

impl RequestedChange {
    pub fn validate(&self) -> Result<RoleChange, &'static str> {
        let action = Action::from_wire(&self.action).ok_or(INVALID_ACTION)?;
        let role = Role::from_label(&self.role).ok_or(INVALID_ROLE)?;
        Ok(RoleChange {
            member_id: self.user_id.clone(),
            display_name: self.username.clone(),
            role,
            action,
        })
    }
}

impl From<&RoleChange> for RequestedChange {
    fn from(change: &RoleChange) -> Self {
        Self {
            user_id: change.member_id.clone(),
            username: change.display_name.clone(),
            role: change.role.label().to_string(),
            action: change.action.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub changes: Vec<RequestedChange>,
}

impl ReconcileRequest {
    pub fn from_changes(changes: &[RoleChange]) -> Self {
        Self {
            changes: changes.iter().map(RequestedChange::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub results: Vec<ApplyOutcome>,
}

impl ReconcileResponse {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Entries of `request` whose outcome failed, as a request that can be resubmitted.
    pub fn failed_changes(&self, request: &ReconcileRequest) -> ReconcileRequest {
        ReconcileRequest {
            changes: request
                .changes
                .iter()
                .zip(&self.results)
                .filter(|(_, outcome)| !outcome.success)
                .map(|(change, _)| change.clone())
                .collect(),
        }
    }
}

/// Apply a wire request. Invalid entries fail in place; valid ones go to the
/// applicator. `results[i]` always answers `request.changes[i]`.
pub fn handle_request<A: MemberApi + ?Sized>(
    applicator: &ChangeApplicator<'_, A>,
    request: &ReconcileRequest,
    credential: &Credential,
) -> Result<ReconcileResponse, ReconcileError> {
    let mut results: Vec<Option<ApplyOutcome>> = Vec::with_capacity(request.changes.len());
    let mut valid = Vec::new();
    for entry in &request.changes {
        match entry.validate() {
            Ok(change) => {
                valid.push(change);
                results.push(None);
            }
            Err(detail) => {
                tracing::warn!(member = %entry.user_id, detail, "rejected change entry");
                results.push(Some(ApplyOutcome::failed(entry.user_id.clone(), None, detail)));
            }
        }
    }

    let mut applied = applicator.apply(&valid, credential)?.into_iter();
    let results = results
        .into_iter()
        .map(|slot| slot.or_else(|| applied.next()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ReconcileError::Upstream {
            status: None,
            detail: "applicator returned fewer outcomes than changes".to_string(),
        })?;
    Ok(ReconcileResponse { results })
}
