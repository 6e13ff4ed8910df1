//! Credential providers and the default chain

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Credentials, CredentialsError, ProvideCredentials};
use crate::config::env_non_empty;

/// Keys supplied in the datasource settings
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(access_key: &str, secret_key: &str, session_token: Option<&str>) -> Self {
        Self {
            credentials: Credentials::new(
                access_key,
                secret_key,
                session_token.map(str::to_string),
                "static",
            ),
        }
    }
}

#[async_trait]
impl ProvideCredentials for StaticProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.credentials.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider;

impl EnvironmentProvider {
    fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials, CredentialsError> {
        let access_key = lookup("AWS_ACCESS_KEY_ID")
            .or_else(|| lookup("AWS_ACCESS_KEY"))
            .ok_or_else(|| CredentialsError::not_loaded("environment", "AWS_ACCESS_KEY_ID not set"))?;
        let secret_key = lookup("AWS_SECRET_ACCESS_KEY")
            .or_else(|| lookup("AWS_SECRET_KEY"))
            .ok_or_else(|| {
                CredentialsError::not_loaded("environment", "AWS_SECRET_ACCESS_KEY not set")
            })?;
        Ok(Credentials::new(
            access_key,
            secret_key,
            lookup("AWS_SESSION_TOKEN"),
            "environment",
        ))
    }
}

#[async_trait]
impl ProvideCredentials for EnvironmentProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        Self::load(env_non_empty)
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}

/// Shared credentials file (`~/.aws/credentials`)
#[derive(Debug, Clone)]
pub struct ProfileProvider {
    path: Option<PathBuf>,
    profile: String,
}

impl Default for ProfileProvider {
    fn default() -> Self {
        let path = env_non_empty("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| {
                env_non_empty("HOME")
                    .or_else(|| env_non_empty("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
            });
        let profile = env_non_empty("AWS_PROFILE").unwrap_or_else(|| "default".to_string());
        Self { path, profile }
    }
}

impl ProfileProvider {
    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            profile: profile.into(),
        }
    }
}

/// Pull one profile's keys out of an INI-style credentials file
fn parse_profile(contents: &str, profile: &str) -> Option<Credentials> {
    let mut in_profile = false;
    let mut access_key = None;
    let mut secret_key = None;
    let mut session_token = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_profile = section.trim() == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim() {
                "aws_access_key_id" => access_key = Some(value),
                "aws_secret_access_key" => secret_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }
    }

    Some(Credentials::new(access_key?, secret_key?, session_token, "profile"))
}

#[async_trait]
impl ProvideCredentials for ProfileProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| CredentialsError::not_loaded("profile", "no home directory"))?;

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialsError::not_loaded(
                    "profile",
                    format!("{} does not exist", path.display()),
                ))
            }
            Err(e) => {
                return Err(CredentialsError::failed(
                    "profile",
                    format!("reading {}: {}", path.display(), e),
                ))
            }
        };

        parse_profile(&contents, &self.profile).ok_or_else(|| {
            CredentialsError::not_loaded(
                "profile",
                format!("profile '{}' has no keys in {}", self.profile, path.display()),
            )
        })
    }

    fn name(&self) -> &'static str {
        "profile"
    }
}

const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Container task-role endpoint
#[derive(Debug, Clone)]
pub struct ContainerProvider {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl ContainerProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn endpoint() -> Option<String> {
        if let Some(relative) = env_non_empty("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            return Some(format!("{}{}", CONTAINER_CREDENTIALS_HOST, relative));
        }
        env_non_empty("AWS_CONTAINER_CREDENTIALS_FULL_URI")
    }
}

#[async_trait]
impl ProvideCredentials for ContainerProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        let url = Self::endpoint().ok_or_else(|| {
            CredentialsError::not_loaded("container", "no container credentials URI set")
        })?;

        let mut request = self.http.get(&url).timeout(Duration::from_secs(5));
        if let Some(token) = env_non_empty("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CredentialsError::failed("container", format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialsError::failed(
                "container",
                format!(
                    "endpoint returned {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            ));
        }

        let body: ContainerCredentials = response
            .json()
            .await
            .map_err(|e| CredentialsError::failed("container", format!("bad response: {}", e)))?;

        let creds = Credentials::new(
            body.access_key_id,
            body.secret_access_key,
            body.token,
            "container",
        );
        Ok(match body.expiration {
            Some(expiration) => creds.with_expiration(expiration),
            None => creds,
        })
    }

    fn name(&self) -> &'static str {
        "container"
    }
}

/// First provider to return credentials wins.
///
/// A provider that has nothing to offer passes to the next one; a provider
/// that applies but fails stops the chain.
pub struct ChainProvider {
    providers: Vec<Arc<dyn ProvideCredentials>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Arc<dyn ProvideCredentials>>) -> Self {
        Self { providers }
    }

    /// Environment, then shared credentials file, then container endpoint
    pub fn default_chain(http: reqwest::Client) -> Self {
        Self::new(vec![
            Arc::new(EnvironmentProvider),
            Arc::new(ProfileProvider::default()),
            Arc::new(ContainerProvider::new(http)),
        ])
    }
}

#[async_trait]
impl ProvideCredentials for ChainProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        let mut skipped = Vec::new();
        for provider in &self.providers {
            match provider.provide_credentials().await {
                Ok(creds) => {
                    tracing::debug!(provider = provider.name(), "Resolved ambient credentials");
                    return Ok(creds);
                }
                Err(CredentialsError::NotLoaded { provider, reason }) => {
                    skipped.push(format!("{}: {}", provider, reason));
                }
                Err(e) => return Err(e),
            }
        }
        Err(CredentialsError::ChainExhausted(skipped.join("; ")))
    }

    fn name(&self) -> &'static str {
        "default-chain"
    }
}
