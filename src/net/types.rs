//! Wire DTOs for the identity gateway boundary.
//!
//! DESIGN
//! ======
//! Field names mirror the gateway's camelCase JSON. Everything except the
//! `authenticated` flag is optional so a partially populated response still
//! decodes and the manager decides what it means.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Identity record of the signed-in operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user identifier issued by the gateway.
    pub id: String,
    #[serde(default)]
    pub email: String,
    /// Human-readable name shown in the console chrome.
    #[serde(default, alias = "name")]
    pub display_name: String,
    /// Role names granted to the user (e.g. `"admin"`, `"support"`).
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Body of `GET {base}/session`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
    /// Credential expiry in seconds since the Unix epoch.
    #[serde(default, deserialize_with = "deserialize_epoch_seconds")]
    pub expires_at: Option<i64>,
    /// Anti-forgery token for state-mutating gateway calls.
    #[serde(default)]
    pub csrf_token: Option<String>,
    /// Structured error reported by the gateway alongside the session flag.
    #[serde(default)]
    pub error: Option<String>,
}

impl SessionResponse {
    /// The "no valid session" answer, used for 401 responses.
    pub fn unauthenticated() -> Self {
        Self::default()
    }
}

/// Body of `GET {base}/csrf`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Optional body of `POST {base}/logout`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    #[serde(default, alias = "redirectUrl")]
    pub redirect_to: Option<String>,
}

/// Options for the interactive login redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginOptions {
    /// Console path to land on after login; defaults to the current path.
    pub return_to: Option<String>,
    /// Gateway prompt hint (e.g. `"login"`, `"select_account"`).
    pub prompt: Option<String>,
}

/// Options for the interactive logout redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogoutOptions {
    pub return_to: Option<String>,
}

fn deserialize_epoch_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                return Ok(Some(int));
            }
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            if let Some(float) = number.as_f64()
                && float.is_finite()
                && float >= i64::MIN as f64
                && float <= i64::MAX as f64
            {
                return Ok(Some(float.floor() as i64));
            }
            Err(D::Error::custom("expected epoch-seconds number"))
        }
        Some(_) => Err(D::Error::custom("expected number")),
    }
}
