//! EC2 instance metadata credentials (IMDSv2).
//!
//! Each call takes a session token with `PUT /latest/api/token`, looks up the
//! instance role name and then fetches that role's credentials.

use std::time::Duration;

use tracing::debug;

use super::credentials::{AgentCredentialsBody, Credentials, CredentialsFuture, CredentialsProvider, EnvLookup};
use crate::errors::{AwsError, make_snippet};

const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";
const TOKEN_PATH: &str = "/latest/api/token";
const ROLE_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: &str = "21600";

#[derive(Clone, Debug)]
pub struct ImdsCredentialsProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl ImdsCredentialsProvider {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AwsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Absent when `AWS_EC2_METADATA_DISABLED=true`.
    /// `AWS_EC2_METADATA_SERVICE_ENDPOINT` overrides the link-local address.
    pub fn from_lookup(get: EnvLookup<'_>) -> Option<Result<Self, AwsError>> {
        if get("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
            return None;
        }
        let endpoint =
            get("AWS_EC2_METADATA_SERVICE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Some(Self::new(endpoint))
    }

    async fn fetch(&self) -> Result<Credentials, AwsError> {
        let token = self
            .text(self.client.put(self.url(TOKEN_PATH)).header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS))
            .await?;
        let token = token.trim();

        let roles = self
            .text(self.client.get(self.url(ROLE_PATH)).header(TOKEN_HEADER, token))
            .await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| AwsError::CredentialsFetch("instance has no IAM role".into()))?;

        debug!(%role, "fetching instance role credentials");
        let url = self.url(&format!("{ROLE_PATH}{role}"));
        let body = self
            .text(self.client.get(&url).header(TOKEN_HEADER, token))
            .await?;
        let body: AgentCredentialsBody = serde_json::from_str(&body)
            .map_err(|e| AwsError::CredentialsFetch(format!("unexpected body: {e}")))?;
        body.into_fresh_credentials(&url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    async fn text(&self, req: reqwest::RequestBuilder) -> Result<String, AwsError> {
        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().to_string();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AwsError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }
        Ok(text)
    }
}

impl CredentialsProvider for ImdsCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        Box::pin(self.fetch())
    }
}
