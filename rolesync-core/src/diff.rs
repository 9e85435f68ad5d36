//! Diff engine: turns a fetched roster and a desired-state source into an
//! ordered change-set.
//!
//! Pure. No I/O, no logging; callers report `unmatched` and `duplicates`
//! from the returned [`ChangePlan`].
//!
//! ## Emission order
//!
//! Source order of the desired records, and within one matched pair:
//! Add-Current, Add-Former, Remove-Current, Remove-Former.

use std::collections::HashMap;

use crate::types::{Action, DesiredRecord, DesiredStatus, Member, Role, RoleChange, RoleFlags};

/// How several desired rows resolving to the same member are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Every row is compared on its own against the fetched flags.
    #[default]
    Independent,
    /// The last row for a member wins; its changes are emitted at the
    /// position of the member's first row.
    LastWins,
}

/// Full result of one diff computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePlan {
    pub changes: Vec<RoleChange>,
    /// Desired display names with no live member.
    pub unmatched: Vec<String>,
    /// Display names of members matched by more than one desired row.
    pub duplicates: Vec<String>,
    /// Rows discarded for having an empty display name.
    pub skipped_blank: usize,
}

impl ChangePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compute the change-set with the default [`DuplicatePolicy::Independent`].
pub fn compute_changes(current: &[Member], desired: &[DesiredRecord]) -> Vec<RoleChange> {
    plan_changes(current, desired, DuplicatePolicy::Independent).changes
}

/// Compute the change-set plus everything a caller needs to explain it.
pub fn plan_changes(
    current: &[Member],
    desired: &[DesiredRecord],
    policy: DuplicatePolicy,
) -> ChangePlan {
    // First roster member wins when display names collide.
    let mut by_name: HashMap<String, &Member> = HashMap::with_capacity(current.len());
    for member in current {
        by_name
            .entry(member.display_name.to_lowercase())
            .or_insert(member);
    }

    let mut plan = ChangePlan::default();
    // (member, status) per matched row, in source order.
    let mut matched: Vec<(&Member, DesiredStatus)> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for record in desired {
        if record.display_name.is_empty() {
            plan.skipped_blank += 1;
            continue;
        }
        let Some(member) = by_name.get(&record.display_name.to_lowercase()).copied() else {
            plan.unmatched.push(record.display_name.clone());
            continue;
        };

        match seen.get(member.id.as_str()).copied() {
            Some(first) => {
                if !plan.duplicates.contains(&member.display_name) {
                    plan.duplicates.push(member.display_name.clone());
                }
                match policy {
                    DuplicatePolicy::Independent => matched.push((member, record.status)),
                    DuplicatePolicy::LastWins => matched[first].1 = record.status,
                }
            }
            None => {
                seen.insert(member.id.as_str(), matched.len());
                matched.push((member, record.status));
            }
        }
    }

    for (member, status) in matched {
        push_pair_changes(&mut plan.changes, member, status.targets());
    }
    plan
}

/// Append the changes for one matched pair, in fixed order.
fn push_pair_changes(out: &mut Vec<RoleChange>, member: &Member, want: RoleFlags) {
    let have = member.roles;
    let candidates = [
        (want.is_current && !have.is_current, Role::Current, Action::Add),
        (want.is_former && !have.is_former, Role::Former, Action::Add),
        (!want.is_current && have.is_current, Role::Current, Action::Remove),
        (!want.is_former && have.is_former, Role::Former, Action::Remove),
    ];
    out.extend(
        candidates
            .into_iter()
            .filter(|(needed, _, _)| *needed)
            .map(|(_, role, action)| RoleChange {
                member_id: member.id.clone(),
                display_name: member.display_name.clone(),
                role,
                action,
            }),
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
