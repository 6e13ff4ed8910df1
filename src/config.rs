//! Datasource settings
//!
//! Carried as JSON by the dashboard host, or loaded from the environment
//! for the probe binary and local testing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Lifetime the provider chain assumes for temporary credentials
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(15 * 60);

/// Session name recorded on role assumptions made for the dashboard
pub const DEFAULT_ROLE_SESSION_NAME: &str = "grafana";

/// Cached credentials are refreshed this long before they expire
pub const CREDENTIAL_EXPIRY_WINDOW: Duration = Duration::from_secs(5 * 60);

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How the process authenticates to the remote services
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "authType", rename_all = "camelCase")]
pub enum AuthType {
    /// Ambient provider chain: environment, shared credentials file, container endpoint
    Default,
    #[serde(rename_all = "camelCase")]
    Keys {
        access_key: String,
        secret_key: String,
    },
    #[serde(rename_all = "camelCase")]
    SessionKeys {
        access_key: String,
        secret_key: String,
        session_token: String,
    },
}

impl Default for AuthType {
    fn default() -> Self {
        Self::Default
    }
}

impl AuthType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Keys { .. } => "keys",
            Self::SessionKeys { .. } => "sessionKeys",
        }
    }
}

impl std::fmt::Debug for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Keys { access_key, .. } => f
                .debug_struct("Keys")
                .field("access_key", access_key)
                .finish_non_exhaustive(),
            Self::SessionKeys { access_key, .. } => f
                .debug_struct("SessionKeys")
                .field("access_key", access_key)
                .finish_non_exhaustive(),
        }
    }
}

/// Datasource JSON. A missing `authType` selects the ambient chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSettings")]
pub struct DataSourceSettings {
    #[serde(flatten)]
    pub auth: AuthType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Catalog endpoint override, used for both catalog planes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Downscoping role for dashboard credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assume_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// Flat wire shape the host sends; the key fields only matter for static auth
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSettings {
    auth_type: Option<String>,
    access_key: String,
    secret_key: String,
    session_token: String,
    region: Option<String>,
    endpoint: Option<String>,
    assume_role_arn: Option<String>,
    external_id: Option<String>,
}

impl TryFrom<RawSettings> for DataSourceSettings {
    type Error = String;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let auth = match raw.auth_type.as_deref().map(str::trim) {
            None | Some("") | Some("default") => AuthType::Default,
            Some("keys") => AuthType::Keys {
                access_key: raw.access_key,
                secret_key: raw.secret_key,
            },
            Some("sessionKeys") => AuthType::SessionKeys {
                access_key: raw.access_key,
                secret_key: raw.secret_key,
                session_token: raw.session_token,
            },
            Some(other) => return Err(format!("unknown authType `{}`", other)),
        };
        Ok(Self {
            auth,
            region: raw.region,
            endpoint: raw.endpoint,
            assume_role_arn: raw.assume_role_arn,
            external_id: raw.external_id,
        })
    }
}

impl DataSourceSettings {
    pub fn new(auth: AuthType, region: impl Into<String>) -> Self {
        Self {
            auth,
            region: Some(region.into()),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_assume_role(mut self, role_arn: impl Into<String>) -> Self {
        self.assume_role_arn = Some(role_arn.into());
        self
    }

    /// Load settings from `TWINMAKER_*` and standard `AWS_*` variables.
    ///
    /// Static keys are used when `TWINMAKER_ACCESS_KEY`/`TWINMAKER_SECRET_KEY`
    /// are both set; otherwise the ambient provider chain is used.
    pub fn from_env() -> Self {
        let auth = match (
            env_non_empty("TWINMAKER_ACCESS_KEY"),
            env_non_empty("TWINMAKER_SECRET_KEY"),
            env_non_empty("TWINMAKER_SESSION_TOKEN"),
        ) {
            (Some(access_key), Some(secret_key), Some(session_token)) => AuthType::SessionKeys {
                access_key,
                secret_key,
                session_token,
            },
            (Some(access_key), Some(secret_key), None) => AuthType::Keys {
                access_key,
                secret_key,
            },
            _ => AuthType::Default,
        };

        Self {
            auth,
            region: env_non_empty("TWINMAKER_REGION"),
            endpoint: env_non_empty("TWINMAKER_ENDPOINT"),
            assume_role_arn: env_non_empty("TWINMAKER_ASSUME_ROLE_ARN"),
            external_id: env_non_empty("TWINMAKER_EXTERNAL_ID"),
        }
    }

    /// The downscoping role, if one is configured
    pub fn role(&self) -> Option<&str> {
        self.assume_role_arn.as_deref().filter(|r| !r.is_empty())
    }

    /// Settings for the token service: base credentials on the standard endpoint.
    /// The token service can not use the downscoping role to mint tokens.
    pub fn token_settings(&self) -> Self {
        Self {
            assume_role_arn: None,
            external_id: None,
            endpoint: None,
            ..self.clone()
        }
    }

    /// Configured region, falling back to `AWS_REGION` then `AWS_DEFAULT_REGION`
    pub fn resolve_region(&self) -> Result<String, SessionError> {
        self.region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| env_non_empty("AWS_REGION"))
            .or_else(|| env_non_empty("AWS_DEFAULT_REGION"))
            .ok_or(SessionError::MissingRegion)
    }

    pub(crate) fn validate_keys(&self) -> Result<(), SessionError> {
        let missing = match &self.auth {
            AuthType::Default => false,
            AuthType::Keys {
                access_key,
                secret_key,
            } => access_key.is_empty() || secret_key.is_empty(),
            AuthType::SessionKeys {
                access_key,
                secret_key,
                session_token,
            } => access_key.is_empty() || secret_key.is_empty() || session_token.is_empty(),
        };
        if missing {
            return Err(SessionError::MissingStaticKeys {
                auth_type: self.auth.name(),
            });
        }
        Ok(())
    }
}

pub(crate) fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_settings_drop_role_and_endpoint() {
        let settings = DataSourceSettings::new(AuthType::Default, "us-east-1")
            .with_endpoint("https://gamma.example.com")
            .with_assume_role("arn:aws:iam::111122223333:role/DashboardRole");

        let token = settings.token_settings();
        assert_eq!(token.role(), None);
        assert_eq!(token.endpoint, None);
        assert_eq!(token.region.as_deref(), Some("us-east-1"));
        assert_eq!(token.auth, settings.auth);
    }

    #[test]
    fn empty_role_is_not_a_role() {
        let mut settings = DataSourceSettings::new(AuthType::Default, "us-east-1");
        settings.assume_role_arn = Some(String::new());
        assert_eq!(settings.role(), None);
    }

    #[test]
    fn deserializes_datasource_json() {
        let settings: DataSourceSettings = serde_json::from_value(serde_json::json!({
            "authType": "sessionKeys",
            "accessKey": "AKID",
            "secretKey": "SECRET",
            "sessionToken": "TOKEN",
            "region": "eu-west-1",
            "assumeRoleArn": "arn:aws:iam::111122223333:role/DashboardRole"
        }))
        .unwrap();

        assert_eq!(settings.auth.name(), "sessionKeys");
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert!(settings.role().is_some());
    }

    #[test]
    fn missing_auth_type_selects_ambient_chain() {
        let settings: DataSourceSettings =
            serde_json::from_value(serde_json::json!({ "region": "us-east-1" })).unwrap();
        assert_eq!(settings.auth, AuthType::Default);
        assert_eq!(settings.region.as_deref(), Some("us-east-1"));

        let settings: DataSourceSettings =
            serde_json::from_value(serde_json::json!({ "authType": "", "region": "us-east-1" }))
                .unwrap();
        assert_eq!(settings.auth, AuthType::Default);
    }

    #[test]
    fn unknown_auth_type_is_rejected() {
        let err = serde_json::from_value::<DataSourceSettings>(serde_json::json!({
            "authType": "ec2_iam_role"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown authType `ec2_iam_role`"));
    }

    #[test]
    fn settings_survive_a_json_round_trip() {
        let settings = DataSourceSettings::new(
            AuthType::Keys {
                access_key: "AKID".into(),
                secret_key: "SECRET".into(),
            },
            "us-east-1",
        )
        .with_assume_role("arn:aws:iam::111122223333:role/DashboardRole");

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["authType"], "keys");
        let back: DataSourceSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn blank_static_keys_are_rejected() {
        let settings = DataSourceSettings::new(
            AuthType::Keys {
                access_key: "AKID".into(),
                secret_key: String::new(),
            },
            "us-east-1",
        );
        assert!(matches!(
            settings.validate_keys(),
            Err(SessionError::MissingStaticKeys { auth_type: "keys" })
        ));
    }

    #[test]
    fn debug_hides_secret_key() {
        let auth = AuthType::Keys {
            access_key: "AKID".into(),
            secret_key: "very-secret".into(),
        };
        assert!(!format!("{:?}", auth).contains("very-secret"));
    }
}
