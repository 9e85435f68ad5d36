//! Error types for rolesync-sync.

use thiserror::Error;

use rolesync_core::ConfigError;

/// Fatal errors of a reconciliation cycle.
///
/// Individual mutation failures are not errors; they are recorded in
/// [`rolesync_core::ApplyOutcome`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Credential missing, invalid or rejected upstream. Re-authenticate.
    #[error("credential rejected: {reason}")]
    Auth { reason: String },

    /// A roster page (or the credential probe) did not succeed.
    #[error("upstream request failed{}: {detail}", status_suffix(.status))]
    Upstream { status: Option<u16>, detail: String },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl ReconcileError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ReconcileError::Auth { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Failure of a single call against the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-2xx response. `body` is the raw response body, possibly empty.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure; no response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// A 2xx response whose body did not decode.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `message` field of a JSON error body, when present.
    pub fn message(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
    }
}

impl From<ApiError> for ReconcileError {
    /// 401/403 become [`ReconcileError::Auth`]; everything else is upstream.
    fn from(err: ApiError) -> Self {
        match err.status() {
            Some(401) | Some(403) => ReconcileError::Auth {
                reason: err.message().unwrap_or_else(|| err.to_string()),
            },
            status => ReconcileError::Upstream {
                status,
                detail: err.message().unwrap_or_else(|| err.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unauthorized(401, true)]
    #[case::forbidden(403, true)]
    #[case::not_found(404, false)]
    #[case::rate_limited(429, false)]
    #[case::server_error(500, false)]
    fn only_401_and_403_are_auth(#[case] status: u16, #[case] auth: bool) {
        let err: ReconcileError = ApiError::Status {
            status,
            body: String::new(),
        }
        .into();
        assert_eq!(err.is_auth(), auth);
    }

    #[test]
    fn unauthorized_maps_to_auth() {
        let err: ReconcileError = ApiError::Status {
            status: 401,
            body: r#"{"message": "401: Unauthorized", "code": 0}"#.into(),
        }
        .into();
        assert!(err.is_auth());
        assert_eq!(err.to_string(), "credential rejected: 401: Unauthorized");
    }

    #[test]
    fn server_error_maps_to_upstream_with_status() {
        let err: ReconcileError = ApiError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, ReconcileError::Upstream { status: Some(502), .. }));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn transport_maps_to_upstream_without_status() {
        let err: ReconcileError = ApiError::Transport("connection refused".into()).into();
        assert!(matches!(err, ReconcileError::Upstream { status: None, .. }));
    }
}
