//! `sts:AssumeRoleWithWebIdentity` credentials (EKS IAM roles for service
//! accounts).
//!
//! The role is assumed on every call and the projected token file, which the
//! kubelet rotates, is read again each time.

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use super::{
    credentials::{Credentials, CredentialsFuture, CredentialsProvider, EnvLookup},
    sigv4::uri_encode,
};
use crate::errors::{AwsError, make_snippet};

const STS_VERSION: &str = "2011-06-15";
const CREDENTIALS_POINTER: &str =
    "/AssumeRoleWithWebIdentityResponse/AssumeRoleWithWebIdentityResult/Credentials";

pub struct WebIdentityCredentialsProvider {
    client: reqwest::Client,
    endpoint: String,
    role_arn: String,
    session_name: String,
    token_file: PathBuf,
}

impl WebIdentityCredentialsProvider {
    pub fn new(
        endpoint: impl Into<String>,
        role_arn: impl Into<String>,
        token_file: impl Into<PathBuf>,
    ) -> Result<Self, AwsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            role_arn: role_arn.into(),
            session_name: format!("eks-rag-{}", Utc::now().timestamp_millis()),
            token_file: token_file.into(),
        })
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    /// Present when both `AWS_WEB_IDENTITY_TOKEN_FILE` and `AWS_ROLE_ARN`
    /// are set. `AWS_ENDPOINT_URL_STS` overrides the regional endpoint.
    pub fn from_lookup(get: EnvLookup<'_>, region: &str) -> Option<Result<Self, AwsError>> {
        let token_file = get("AWS_WEB_IDENTITY_TOKEN_FILE")?;
        let role_arn = get("AWS_ROLE_ARN")?;
        let endpoint = get("AWS_ENDPOINT_URL_STS")
            .unwrap_or_else(|| format!("https://sts.{region}.amazonaws.com"));

        Some(Self::new(endpoint, role_arn, token_file).map(|p| {
            match get("AWS_ROLE_SESSION_NAME") {
                Some(name) => p.with_session_name(name),
                None => p,
            }
        }))
    }

    async fn assume_role(&self) -> Result<Credentials, AwsError> {
        let token = tokio::fs::read_to_string(&self.token_file).await?;
        let form = format!(
            "Action=AssumeRoleWithWebIdentity&Version={STS_VERSION}&RoleArn={}&RoleSessionName={}&WebIdentityToken={}",
            uri_encode(self.role_arn.as_bytes()),
            uri_encode(self.session_name.as_bytes()),
            uri_encode(token.trim().as_bytes()),
        );

        debug!(endpoint = %self.endpoint, role = %self.role_arn, "assuming role with web identity");
        let resp = self
            .client
            .post(format!("{}/", self.endpoint))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
            .header(ACCEPT, "application/json")
            .body(form)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AwsError::HttpStatus {
                status,
                url: self.endpoint.clone(),
                snippet: make_snippet(&text),
            });
        }

        let v: Value = serde_json::from_str(&text)
            .map_err(|e| AwsError::CredentialsFetch(format!("unexpected STS body: {e}")))?;
        parse_assumed_credentials(&v)
    }
}

impl CredentialsProvider for WebIdentityCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        Box::pin(self.assume_role())
    }
}

fn parse_assumed_credentials(v: &Value) -> Result<Credentials, AwsError> {
    let node = v
        .pointer(CREDENTIALS_POINTER)
        .ok_or_else(|| AwsError::CredentialsFetch("STS answer has no Credentials".into()))?;
    let field = |name: &'static str| {
        node.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AwsError::MissingCredentials(name))
    };

    // The JSON protocol sends epoch seconds; some endpoints send RFC 3339.
    let expiration = match node.get("Expiration") {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    };

    Ok(Credentials {
        access_key_id: field("AccessKeyId")?,
        secret_access_key: field("SecretAccessKey")?,
        session_token: Some(field("SessionToken")?),
        expiration,
    })
}
