//! Remote membership service seam.
//!
//! [`MemberApi`] is the only thing the fetcher and applicator talk to.
//! [`HttpMemberApi`] implements it against the guild REST API with `ureq`;
//! tests substitute in-memory fakes.

use std::time::Duration;

use serde::Deserialize;

use rolesync_core::{GuildId, MemberId, RoleId, ServiceConfig};

use crate::credential::Credential;
use crate::error::ApiError;

/// User part of a roster record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteUser {
    pub id: MemberId,
    pub username: String,
    /// Service accounts. Absent means human.
    #[serde(default)]
    pub bot: bool,
}

/// One record of a roster page, consumed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteMember {
    pub user: RemoteUser,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RemoteMember {
    pub fn new(id: &str, username: &str, bot: bool, roles: &[&str]) -> Self {
        Self {
            user: RemoteUser {
                id: MemberId::from(id),
                username: username.to_string(),
                bot,
            },
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Operations the reconciliation core needs from the remote service.
///
/// Implementations forward `credential` unmodified and perform no retries.
pub trait MemberApi: Send + Sync {
    /// One roster page of at most `limit` records with ids greater than `after`.
    fn list_members(
        &self,
        credential: &Credential,
        after: Option<&MemberId>,
        limit: usize,
    ) -> Result<Vec<RemoteMember>, ApiError>;

    /// Grant `role` to `member` (no-op if already held). Returns the HTTP status.
    fn add_role(
        &self,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<u16, ApiError>;

    /// Revoke `role` from `member` (no-op if not held). Returns the HTTP status.
    fn remove_role(
        &self,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<u16, ApiError>;

    /// Cheap probe that fails with 401/403 when the credential is rejected.
    fn verify_credential(&self, credential: &Credential) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Guild REST API over blocking `ureq`.
pub struct HttpMemberApi {
    agent: ureq::Agent,
    api_base: String,
    guild_id: GuildId,
    auth_scheme: String,
}

impl HttpMemberApi {
    pub fn new(config: &ServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("rolesync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            guild_id: config.guild_id.clone(),
            auth_scheme: config.auth_scheme.clone(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn members_url(&self) -> String {
        format!("{}/guilds/{}/members", self.api_base, self.guild_id)
    }

    fn member_role_url(&self, member: &MemberId, role: &RoleId) -> String {
        format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, self.guild_id, member, role
        )
    }

    fn authorization(&self, credential: &Credential) -> String {
        if self.auth_scheme.is_empty() {
            credential.expose().to_string()
        } else {
            format!("{} {}", self.auth_scheme, credential.expose())
        }
    }

    fn mutate(
        &self,
        method: &str,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<u16, ApiError> {
        let response = self
            .agent
            .request(method, &self.member_role_url(member, role))
            .set("Authorization", &self.authorization(credential))
            .call()?;
        Ok(response.status())
    }
}

impl MemberApi for HttpMemberApi {
    fn list_members(
        &self,
        credential: &Credential,
        after: Option<&MemberId>,
        limit: usize,
    ) -> Result<Vec<RemoteMember>, ApiError> {
        let mut request = self
            .agent
            .get(&self.members_url())
            .set("Authorization", &self.authorization(credential))
            .query("limit", &limit.to_string());
        if let Some(after) = after {
            request = request.query("after", after.as_str());
        }
        request
            .call()?
            .into_json::<Vec<RemoteMember>>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn add_role(
        &self,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<u16, ApiError> {
        self.mutate("PUT", credential, member, role)
    }

    fn remove_role(
        &self,
        credential: &Credential,
        member: &MemberId,
        role: &RoleId,
    ) -> Result<u16, ApiError> {
        self.mutate("DELETE", credential, member, role)
    }

    fn verify_credential(&self, credential: &Credential) -> Result<(), ApiError> {
        self.agent
            .get(&format!("{}/users/@me", self.api_base))
            .set("Authorization", &self.authorization(credential))
            .call()?;
        Ok(())
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => ApiError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}
