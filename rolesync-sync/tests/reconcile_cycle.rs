//! Full fetch → diff → apply → re-fetch cycles against an in-memory guild.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use rolesync_core::{
    Action, DesiredRecord, DesiredStatus, DuplicatePolicy, MemberId, Role, RoleChange, RoleId,
    RoleMap, RosterSummary, ServiceConfig,
};
use rolesync_sync::{
    apply::ChangeApplicator,
    pipeline::{run_cycle, CycleOptions},
    protocol::{handle_request, ReconcileRequest, RequestedChange},
    ApiError, Credential, MemberApi, ReconcileError, RemoteMember,
};

const TOKEN: &str = "guild-bot-token";

/// A guild whose members are kept sorted by id, like the real roster endpoint.
struct FakeGuild {
    members: Mutex<BTreeMap<String, (String, bool, BTreeSet<String>)>>,
    /// Member ids whose mutations fail with HTTP 403.
    protected: BTreeSet<String>,
    /// Page requests after this many succeed with HTTP 502.
    listing_budget: Option<usize>,
    page_requests: Mutex<usize>,
}

impl FakeGuild {
    fn new(members: &[(&str, &str, bool, &[&str])]) -> Self {
        Self {
            members: Mutex::new(
                members
                    .iter()
                    .map(|(id, name, bot, roles)| {
                        (
                            id.to_string(),
                            (
                                name.to_string(),
                                *bot,
                                roles.iter().map(|r| r.to_string()).collect(),
                            ),
                        )
                    })
                    .collect(),
            ),
            protected: BTreeSet::new(),
            listing_budget: None,
            page_requests: Mutex::new(0),
        }
    }

    fn protect(mut self, id: &str) -> Self {
        self.protected.insert(id.to_string());
        self
    }

    fn fail_listing_after(mut self, pages: usize) -> Self {
        self.listing_budget = Some(pages);
        self
    }

    fn check(&self, credential: &Credential) -> Result<(), ApiError> {
        if credential.expose() != TOKEN {
            return Err(ApiError::Status {
                status: 401,
                body: r#"{"message": "401: Unauthorized", "code": 0}"#.to_string(),
            });
        }
        Ok(())
    }

    fn roles_of(&self, id: &str) -> BTreeSet<String> {
        self.members.lock().unwrap()[id].2.clone()
    }

    fn mutate(
        &self,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
        grant: bool,
    ) -> Result<u16, ApiError> {
        self.check(credential)?;
        if self.protected.contains(&member.0) {
            return Err(ApiError::Status {
                status: 403,
                body: r#"{"message": "Missing Permissions", "code": 50013}"#.to_string(),
            });
        }
        let mut members = self.members.lock().unwrap();
        let Some(entry) = members.get_mut(&member.0) else {
            return Err(ApiError::Status {
                status: 404,
                body: r#"{"message": "Unknown Member", "code": 10007}"#.to_string(),
            });
        };
        if grant {
            entry.2.insert(role.0.clone());
        } else {
            entry.2.remove(&role.0);
        }
        Ok(204)
    }
}

impl MemberApi for FakeGuild {
    fn list_members(
        &self,
        credential: &Credential,
        after: Option<&MemberId>,
        limit: usize,
    ) -> Result<Vec<RemoteMember>, ApiError> {
        self.check(credential)?;
        let mut requests = self.page_requests.lock().unwrap();
        if self.listing_budget.is_some_and(|budget| *requests >= budget) {
            return Err(ApiError::Status {
                status: 502,
                body: String::new(),
            });
        }
        *requests += 1;
        drop(requests);
        let members = self.members.lock().unwrap();
        Ok(members
            .iter()
            .filter(|(id, _)| after.map_or(true, |a| id.as_str() > a.as_str()))
            .take(limit)
            .map(|(id, (name, bot, roles))| {
                let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
                RemoteMember::new(id, name, *bot, &roles)
            })
            .collect())
    }

    fn add_role(&self, credential: &Credential, member: &MemberId, role: &RoleId) -> Result<u16, ApiError> {
        self.mutate(credential, member, role, true)
    }

    fn remove_role(&self, credential: &Credential, member: &MemberId, role: &RoleId) -> Result<u16, ApiError> {
        self.mutate(credential, member, role, false)
    }

    fn verify_credential(&self, credential: &Credential) -> Result<(), ApiError> {
        self.check(credential)
    }
}

const CURRENT: &str = "111";
const FORMER: &str = "222";

fn config(page_size: usize) -> ServiceConfig {
    let mut config = ServiceConfig::new("900", RoleMap::new(CURRENT, FORMER));
    config.page_size = page_size;
    config
}

fn guild() -> FakeGuild {
    FakeGuild::new(&[
        ("01", "Bob", false, &[CURRENT]),
        ("02", "Amy", false, &[]),
        ("03", "Cy", false, &[CURRENT, FORMER]),
        ("04", "roster-bot", true, &[CURRENT]),
        ("05", "Dee", false, &[FORMER, "999"]),
    ])
}

fn desired() -> Vec<DesiredRecord> {
    vec![
        DesiredRecord::new("bob", DesiredStatus::Former),
        DesiredRecord::new("Amy", DesiredStatus::Current),
        DesiredRecord::new("CY", DesiredStatus::Unspecified),
        DesiredRecord::new("ROSTER-BOT", DesiredStatus::Unspecified),
        DesiredRecord::new("Dee", DesiredStatus::Former),
        DesiredRecord::new("Ghost", DesiredStatus::Current),
    ]
}

fn cred() -> Credential {
    Credential::new(TOKEN).expect("credential")
}

fn set(roles: &[&str]) -> BTreeSet<String> {
    roles.iter().map(|r| r.to_string()).collect()
}

#[test]
fn cycle_converges_and_refetches_ground_truth() {
    let guild = guild();
    let report = run_cycle(&guild, &config(2), &cred(), &desired(), CycleOptions::default())
        .expect("cycle");

    assert_eq!(report.plan.changes.len(), 5);
    // Bots never enter the roster, so the bot row is unmatched too.
    assert_eq!(
        report.plan.unmatched,
        vec!["ROSTER-BOT".to_string(), "Ghost".to_string()]
    );
    assert_eq!(report.outcomes.len(), report.plan.changes.len());
    assert_eq!(report.failed(), 0);

    assert_eq!(report.before, RosterSummary { total: 4, current: 2, former: 2 });
    assert_eq!(report.after, Some(RosterSummary { total: 4, current: 1, former: 2 }));

    assert_eq!(guild.roles_of("01"), set(&[FORMER]));
    assert_eq!(guild.roles_of("02"), set(&[CURRENT]));
    assert!(guild.roles_of("03").is_empty());
    assert_eq!(guild.roles_of("04"), set(&[CURRENT]), "bots are never touched");
    assert_eq!(guild.roles_of("05"), set(&[FORMER, "999"]));

    let second = run_cycle(&guild, &config(2), &cred(), &desired(), CycleOptions::default())
        .expect("second cycle");
    assert!(second.plan.changes.is_empty(), "second pass must be a no-op");
    assert!(second.after.is_none());
}

#[test]
fn failed_refetch_keeps_outcomes_of_issued_mutations() {
    let guild = guild().fail_listing_after(1);
    let desired = vec![DesiredRecord::new("Bob", DesiredStatus::Former)];
    let report = run_cycle(&guild, &config(1000), &cred(), &desired, CycleOptions::default())
        .expect("outcomes survive a failed re-fetch");

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.success));
    assert!(report.after.is_none());
    assert!(report
        .refetch_error
        .as_deref()
        .is_some_and(|e| e.contains("502")));
    assert_eq!(guild.roles_of("01"), set(&[FORMER]));
}

#[test]
fn dry_run_issues_no_mutations() {
    let guild = guild();
    let options = CycleOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = run_cycle(&guild, &config(1000), &cred(), &desired(), options).expect("cycle");
    assert_eq!(report.plan.changes.len(), 5);
    assert!(report.outcomes.is_empty());
    assert!(report.after.is_none());
    assert_eq!(guild.roles_of("01"), set(&[CURRENT]));
    assert_eq!(*guild.page_requests.lock().unwrap(), 1);
}

#[test]
fn partial_failure_is_data_not_error() {
    let guild = guild().protect("02");
    let report = run_cycle(&guild, &config(1000), &cred(), &desired(), CycleOptions::default())
        .expect("cycle");

    assert_eq!(report.outcomes.len(), report.plan.changes.len());
    assert_eq!(report.failed(), 1);
    let failed: Vec<_> = report
        .plan
        .changes
        .iter()
        .zip(&report.outcomes)
        .filter(|(_, o)| !o.success)
        .map(|(c, o)| (c.member_id.as_str(), c.role, c.action, o.status_code))
        .collect();
    assert_eq!(failed, vec![("02", Role::Current, Action::Add, Some(403))]);
    assert_eq!(guild.roles_of("01"), set(&[FORMER]));
}

#[test]
fn rejected_credential_aborts_cycle() {
    let guild = guild();
    let wrong = Credential::new("expired").expect("credential");
    let err = run_cycle(&guild, &config(1000), &wrong, &desired(), CycleOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Auth { .. }), "got: {err}");
    assert_eq!(guild.roles_of("01"), set(&[CURRENT]));
}

#[test]
fn last_wins_policy_collapses_duplicate_rows() {
    let guild = guild();
    let desired = vec![
        DesiredRecord::new("Amy", DesiredStatus::Current),
        DesiredRecord::new("amy", DesiredStatus::Former),
    ];
    let options = CycleOptions {
        dry_run: false,
        duplicates: DuplicatePolicy::LastWins,
    };
    let report = run_cycle(&guild, &config(1000), &cred(), &desired, options).expect("cycle");
    assert_eq!(report.plan.duplicates, vec!["Amy".to_string()]);
    assert_eq!(guild.roles_of("02"), set(&[FORMER]));
}

#[test]
fn wire_request_applies_valid_entries_and_flags_invalid_ones() {
    let guild = guild();
    let config = config(1000);
    let applicator = ChangeApplicator::new(&guild, &config.roles);

    let bob_former = RoleChange {
        member_id: MemberId::from("01"),
        display_name: "Bob".into(),
        role: Role::Former,
        action: Action::Add,
    };
    let mut request = ReconcileRequest::from_changes(&[bob_former]);
    request.changes.insert(
        0,
        RequestedChange {
            user_id: MemberId::from("02"),
            username: "Amy".into(),
            role: "Current Member".into(),
            action: "promote".into(),
        },
    );
    request.changes.push(RequestedChange {
        user_id: MemberId::from("99"),
        username: "nobody".into(),
        role: "Current Member".into(),
        action: "add".into(),
    });

    let response = handle_request(&applicator, &request, &cred()).expect("response");
    assert_eq!(response.results.len(), 3);
    assert_eq!(response.results[0].error_detail.as_deref(), Some("Invalid action"));
    assert!(response.results[1].success);
    assert_eq!(response.results[2].status_code, Some(404));
    assert_eq!(guild.roles_of("01"), set(&[CURRENT, FORMER]));

    let retry = response.failed_changes(&request);
    let ids: Vec<_> = retry.changes.iter().map(|c| c.user_id.as_str()).collect();
    assert_eq!(ids, vec!["02", "99"]);
}
