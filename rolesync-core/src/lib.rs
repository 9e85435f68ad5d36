//! rolesync core library — domain types, configuration, desired-state input,
//! and the diff engine.
//!
//! - [`types`] — newtypes and domain structs
//! - [`error`] — [`ConfigError`], [`SourceError`]
//! - [`config`] — role mapping and service config load / save
//! - [`source`] — desired-state CSV adapter
//! - [`diff`] — [`compute_changes`] / [`plan_changes`]

pub mod config;
pub mod diff;
pub mod error;
pub mod source;
pub mod types;

pub use config::{RoleMap, ServiceConfig};
pub use diff::{compute_changes, plan_changes, ChangePlan, DuplicatePolicy};
pub use error::{ConfigError, SourceError};
pub use types::{
    Action, ApplyOutcome, DesiredRecord, DesiredStatus, GuildId, Member, MemberId, Role,
    RoleChange, RoleFlags, RoleId, RosterSummary,
};
