//! Credential providers and the default chain.
//!
//! Providers are consulted on **every** signed request. The container
//! provider re-reads its authorization token file each time, so rotated pod
//! identity tokens are picked up without a restart.
//!
//! [`default_provider`] resolves in this order: static environment keys,
//! web identity (IRSA), shared profile files, the container agent, then the
//! EC2 instance metadata service.

use std::{fmt, future::Future, path::PathBuf, pin::Pin, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    imds::ImdsCredentialsProvider, profile::ProfileCredentialsProvider, region_from_lookup,
    web_identity::WebIdentityCredentialsProvider,
};
use crate::errors::{AwsError, make_snippet};

/// Environment lookup; returns `None` for unset or blank variables.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Link-local host of the ECS/EKS credential agent for relative URIs.
const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// A resolved set of AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Long-lived credentials without a session token.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    /// Attaches a session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// True once `expiration` is in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Boxed future returned by [`CredentialsProvider::credentials`].
pub type CredentialsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Credentials, AwsError>> + Send + 'a>>;

/// Capability that yields fresh credentials for one outbound call.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> CredentialsFuture<'_>;
}

/// Fixed credentials. Used by tests and for local development.
#[derive(Clone, Debug)]
pub struct StaticCredentialsProvider(pub Credentials);

impl CredentialsProvider for StaticCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        let creds = self.0.clone();
        Box::pin(async move { Ok(creds) })
    }
}

/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and optional
/// `AWS_SESSION_TOKEN` from the process environment at call time.
#[derive(Clone, Debug, Default)]
pub struct EnvCredentialsProvider;

impl EnvCredentialsProvider {
    fn read() -> Result<Credentials, AwsError> {
        let access = non_empty_env("AWS_ACCESS_KEY_ID")
            .ok_or(AwsError::MissingCredentials("AWS_ACCESS_KEY_ID"))?;
        let secret = non_empty_env("AWS_SECRET_ACCESS_KEY")
            .ok_or(AwsError::MissingCredentials("AWS_SECRET_ACCESS_KEY"))?;
        let mut creds = Credentials::new(access, secret);
        creds.session_token = non_empty_env("AWS_SESSION_TOKEN");
        Ok(creds)
    }
}

impl CredentialsProvider for EnvCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        Box::pin(async { Self::read() })
    }
}

/// Where the container provider finds its authorization token.
#[derive(Clone, Debug)]
enum AuthToken {
    None,
    Value(String),
    File(PathBuf),
}

/// Container credential agent (EKS Pod Identity, ECS task roles).
///
/// `GET {uri}` with an optional `Authorization` header returns
/// `{AccessKeyId, SecretAccessKey, Token, Expiration}`.
#[derive(Clone, Debug)]
pub struct ContainerCredentialsProvider {
    client: reqwest::Client,
    uri: String,
    token: AuthToken,
}

impl ContainerCredentialsProvider {
    /// Builds a provider for an explicit URI without authorization.
    pub fn new(uri: impl Into<String>) -> Result<Self, AwsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            uri: uri.into(),
            token: AuthToken::None,
        })
    }

    /// Sends `token` verbatim as the `Authorization` header.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = AuthToken::Value(token.into());
        self
    }

    /// Reads the `Authorization` header value from `path` on every call.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token = AuthToken::File(path.into());
        self
    }

    /// Returns a provider when the container credential variables are set.
    ///
    /// `AWS_CONTAINER_CREDENTIALS_FULL_URI` wins over
    /// `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`. The token comes from
    /// `AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE` or
    /// `AWS_CONTAINER_AUTHORIZATION_TOKEN`.
    pub fn from_env() -> Option<Result<Self, AwsError>> {
        Self::from_lookup(&non_empty_env)
    }

    pub fn from_lookup(get: EnvLookup<'_>) -> Option<Result<Self, AwsError>> {
        let uri = get("AWS_CONTAINER_CREDENTIALS_FULL_URI").or_else(|| {
            get("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
                .map(|rel| format!("{CONTAINER_CREDENTIALS_HOST}{rel}"))
        })?;

        Some(Self::new(uri).map(|p| {
            if let Some(file) = get("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE") {
                p.with_token_file(file)
            } else if let Some(token) = get("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
                p.with_token(token)
            } else {
                p
            }
        }))
    }

    async fn fetch(&self) -> Result<Credentials, AwsError> {
        let mut req = self.client.get(&self.uri);
        match &self.token {
            AuthToken::None => {}
            AuthToken::Value(v) => req = req.header(reqwest::header::AUTHORIZATION, v.trim()),
            AuthToken::File(path) => {
                let v = tokio::fs::read_to_string(path).await?;
                req = req.header(reqwest::header::AUTHORIZATION, v.trim());
            }
        }

        debug!(uri = %self.uri, "fetching container credentials");
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AwsError::HttpStatus {
                status,
                url: self.uri.clone(),
                snippet: make_snippet(&body),
            });
        }

        let body: AgentCredentialsBody = resp
            .json()
            .await
            .map_err(|e| AwsError::CredentialsFetch(format!("unexpected body: {e}")))?;
        body.into_fresh_credentials(&self.uri)
    }
}

impl CredentialsProvider for ContainerCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        Box::pin(self.fetch())
    }
}

/// Body served by the container agent and by instance metadata.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AgentCredentialsBody {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

impl AgentCredentialsBody {
    /// Converts the body, refusing credentials that are already expired.
    pub(crate) fn into_fresh_credentials(self, source: &str) -> Result<Credentials, AwsError> {
        let expiration = self
            .expiration
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| AwsError::CredentialsFetch(format!("invalid Expiration: {e}")))?
            .map(|t| t.with_timezone(&Utc));

        let creds = Credentials {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.token,
            expiration,
        };

        if creds.is_expired(Utc::now()) {
            warn!(%source, "credential agent returned expired credentials");
            return Err(AwsError::CredentialsFetch(
                "credential agent returned expired credentials".into(),
            ));
        }
        Ok(creds)
    }
}

/// Builds the default chain from the process environment.
pub fn default_provider() -> Result<Arc<dyn CredentialsProvider>, AwsError> {
    provider_from_lookup(&non_empty_env)
}

/// Builds the default chain from `get`.
///
/// The first source whose variables or files are present wins. When nothing
/// is configured the instance metadata service is used, unless
/// `AWS_EC2_METADATA_DISABLED=true`, in which case the environment provider
/// reports the missing keys on first use.
pub fn provider_from_lookup(get: EnvLookup<'_>) -> Result<Arc<dyn CredentialsProvider>, AwsError> {
    if get("AWS_ACCESS_KEY_ID").is_some() && get("AWS_SECRET_ACCESS_KEY").is_some() {
        debug!("using environment credentials");
        return Ok(Arc::new(EnvCredentialsProvider));
    }
    if let Some(provider) = WebIdentityCredentialsProvider::from_lookup(get, &region_from_lookup(get)) {
        debug!("using web identity credentials");
        return Ok(Arc::new(provider?));
    }
    if let Some(provider) = ProfileCredentialsProvider::from_lookup(get) {
        debug!(profile = provider.profile(), "using shared profile credentials");
        return Ok(Arc::new(provider));
    }
    if let Some(provider) = ContainerCredentialsProvider::from_lookup(get) {
        debug!("using container credentials");
        return Ok(Arc::new(provider?));
    }
    if let Some(provider) = ImdsCredentialsProvider::from_lookup(get) {
        debug!("using instance metadata credentials");
        return Ok(Arc::new(provider?));
    }
    Ok(Arc::new(EnvCredentialsProvider))
}

pub(crate) fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn container_provider_sends_token_from_file_each_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/creds"))
            .and(header("authorization", "pod-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "AccessKeyId": "AKID",
                "SecretAccessKey": "SECRET",
                "Token": "SESSION",
                "Expiration": "2999-01-01T00:00:00Z"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "pod-token\n").unwrap();

        let provider = ContainerCredentialsProvider::new(format!("{}/creds", server.uri()))
            .unwrap()
            .with_token_file(&token_path);

        let first = provider.credentials().await.unwrap();
        let second = provider.credentials().await.unwrap();
        assert_eq!(first.access_key_id, "AKID");
        assert_eq!(second.session_token.as_deref(), Some("SESSION"));
    }

    #[tokio::test]
    async fn container_provider_rejects_expired_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "AccessKeyId": "AKID",
                "SecretAccessKey": "SECRET",
                "Expiration": "2001-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let provider = ContainerCredentialsProvider::new(server.uri()).unwrap();
        let err = provider.credentials().await.unwrap_err();
        assert!(matches!(err, AwsError::CredentialsFetch(_)));
    }

    #[tokio::test]
    async fn chain_assumes_role_from_web_identity_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=AssumeRoleWithWebIdentity"))
            .and(body_string_contains("WebIdentityToken=irsa-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "AssumeRoleWithWebIdentityResponse": { "AssumeRoleWithWebIdentityResult": {
                    "Credentials": {
                        "AccessKeyId": "ASIAIRSA",
                        "SecretAccessKey": "SECRET",
                        "SessionToken": "SESSION",
                        "Expiration": 32503680000.0
                    }
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("token");
        std::fs::write(&token, "irsa-jwt").unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("AWS_WEB_IDENTITY_TOKEN_FILE", token.display().to_string()),
            ("AWS_ROLE_ARN", "arn:aws:iam::123:role/rag".to_string()),
            ("AWS_ENDPOINT_URL_STS", server.uri()),
            ("AWS_SHARED_CREDENTIALS_FILE", dir.path().join("none").display().to_string()),
            ("AWS_CONFIG_FILE", dir.path().join("none").display().to_string()),
            ("AWS_EC2_METADATA_DISABLED", "true".to_string()),
        ]);
        let get = |k: &str| vars.get(k).cloned();

        let creds = provider_from_lookup(&get).unwrap().credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "ASIAIRSA");
        assert_eq!(creds.session_token.as_deref(), Some("SESSION"));
    }

    #[tokio::test]
    async fn chain_prefers_profile_over_container_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("credentials");
        std::fs::write(&file, "[default]\naws_access_key_id = AKPROFILE\naws_secret_access_key = S\n").unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("AWS_SHARED_CREDENTIALS_FILE", file.display().to_string()),
            ("AWS_CONFIG_FILE", dir.path().join("none").display().to_string()),
            ("AWS_CONTAINER_CREDENTIALS_FULL_URI", server.uri()),
        ]);
        let get = |k: &str| vars.get(k).cloned();

        let creds = provider_from_lookup(&get).unwrap().credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "AKPROFILE");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials::new("AKID", "very-secret").with_session_token("tok");
        let shown = format!("{creds:?}");
        assert!(shown.contains("AKID"));
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("tok\""));
    }
}
