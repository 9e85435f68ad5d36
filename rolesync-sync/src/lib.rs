//! # rolesync-sync
//!
//! Remote side of reconciliation: roster fetching, change application and the
//! request/response protocol.
//!
//! Call [`pipeline::run_cycle`] for a whole fetch → diff → apply pass, or use
//! [`fetch_all_members`] and [`ChangeApplicator`] directly.

pub mod api;
pub mod apply;
pub mod credential;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod roster;

pub use api::{HttpMemberApi, MemberApi, RemoteMember, RemoteUser};
pub use apply::ChangeApplicator;
pub use credential::Credential;
pub use error::{ApiError, ReconcileError};
pub use pipeline::{run_cycle, CycleOptions, CycleReport};
pub use protocol::{ReconcileRequest, ReconcileResponse, RequestedChange};
pub use roster::{fetch_all_members, RosterPages};
