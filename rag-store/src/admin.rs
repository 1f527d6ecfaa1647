//! OpenSearch Serverless control plane and STS caller identity.
//!
//! The control plane speaks AWS JSON 1.0: every call is `POST /` with
//! `X-Amz-Target: OpenSearchServerless.<Operation>` and a JSON body. Errors
//! come back as `{"__type": "...Exception", "message": "..."}`.

use std::sync::Arc;

use reqwest::{
    StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use services::{
    aws::{CredentialsProvider, SigV4Signer},
    errors::make_snippet,
    http_policy::{HttpPolicy, send_with_retry},
};
use tracing::{debug, warn};

use crate::config::RagConfig;
use crate::errors::RagError;

const TARGET_PREFIX: &str = "OpenSearchServerless";
const JSON_1_0: &str = "application/x-amz-json-1.0";

/// Summary returned by `ListCollections`.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// Detail returned by `BatchGetCollection`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub collection_endpoint: Option<String>,
}

/// Security policy flavours accepted by `CreateSecurityPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityPolicyType {
    Encryption,
    Network,
}

impl SecurityPolicyType {
    fn as_str(self) -> &'static str {
        match self {
            SecurityPolicyType::Encryption => "encryption",
            SecurityPolicyType::Network => "network",
        }
    }
}

/// Signed client for the serverless control plane.
pub struct ServerlessAdmin {
    client: reqwest::Client,
    signer: SigV4Signer,
    policy: HttpPolicy,
    endpoint: String,
}

impl ServerlessAdmin {
    pub fn new(cfg: &RagConfig, credentials: Arc<dyn CredentialsProvider>) -> Result<Self, RagError> {
        let policy = HttpPolicy::default();
        Ok(Self {
            client: policy.build_client()?,
            signer: SigV4Signer::new(cfg.region.clone(), "aoss", credentials),
            policy,
            endpoint: cfg.admin_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub async fn create_security_policy(
        &self,
        name: &str,
        kind: SecurityPolicyType,
        document: &Value,
    ) -> Result<(), RagError> {
        let body = json!({ "name": name, "type": kind.as_str(), "policy": document.to_string() });
        self.create("CreateSecurityPolicy", &body).await
    }

    pub async fn create_access_policy(&self, name: &str, document: &Value) -> Result<(), RagError> {
        let body = json!({ "name": name, "type": "data", "policy": document.to_string() });
        self.create("CreateAccessPolicy", &body).await
    }

    /// Creates a `VECTORSEARCH` collection.
    pub async fn create_collection(&self, name: &str, description: &str) -> Result<(), RagError> {
        let body = json!({ "name": name, "type": "VECTORSEARCH", "description": description });
        self.create("CreateCollection", &body).await
    }

    /// Collections whose name equals `name`.
    pub async fn list_collections(&self, name: &str) -> Result<Vec<CollectionSummary>, RagError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Out {
            #[serde(default)]
            collection_summaries: Vec<CollectionSummary>,
        }
        let body = json!({ "collectionFilters": { "name": name } });
        Ok(self.call::<Out>("ListCollections", &body).await?.collection_summaries)
    }

    pub async fn batch_get_collection(&self, ids: &[String]) -> Result<Vec<CollectionDetail>, RagError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Out {
            #[serde(default)]
            collection_details: Vec<CollectionDetail>,
        }
        let body = json!({ "ids": ids });
        Ok(self.call::<Out>("BatchGetCollection", &body).await?.collection_details)
    }

    /// Create* calls are not replayed once the server has seen them.
    async fn create(&self, operation: &str, body: &Value) -> Result<(), RagError> {
        self.call_with::<Value>(&self.policy.for_writes(), operation, body)
            .await
            .map(drop)
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: &Value) -> Result<T, RagError> {
        self.call_with(&self.policy, operation, body).await
    }

    async fn call_with<T: DeserializeOwned>(
        &self,
        policy: &HttpPolicy,
        operation: &str,
        body: &Value,
    ) -> Result<T, RagError> {
        let target = format!("{TARGET_PREFIX}.{operation}");
        let payload = serde_json::to_vec(body)?;
        debug!(%operation, endpoint = %self.endpoint, "control-plane call");

        let resp = send_with_retry(policy, operation, |_| {
            let payload = payload.clone();
            let target = target.clone();
            async move {
                let mut req = self
                    .client
                    .post(format!("{}/", self.endpoint))
                    .header(CONTENT_TYPE, JSON_1_0)
                    .header("x-amz-target", target)
                    .body(payload)
                    .build()?;
                self.signer.sign(&mut req).await?;
                Ok::<_, RagError>(self.client.execute(req).await?)
            }
        })
        .await?;

        let status = resp.status();
        let header_type = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let err = classify_json_error(status, operation, header_type.as_deref(), &text);
            warn!(%operation, %status, error = %err, "control-plane call failed");
            return Err(err);
        }
        serde_json::from_slice(&bytes).map_err(|e| RagError::Decode(format!("{operation}: {e}")))
    }
}

/// Maps an AWS JSON 1.0 error onto [`RagError`].
fn classify_json_error(
    status: StatusCode,
    operation: &str,
    header_type: Option<&str>,
    body: &str,
) -> RagError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let raw_type = header_type
        .map(str::to_string)
        .or_else(|| parsed.get("__type").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    // `aws.protocoltests#ConflictException:http://...` → `ConflictException`
    let kind = raw_type
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default();
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| make_snippet(body));
    let detail = format!("{operation}: {kind}: {message}");

    match (kind, status) {
        ("ConflictException", _) => RagError::AlreadyExists(detail),
        ("ResourceNotFoundException", _) | (_, StatusCode::NOT_FOUND) => RagError::NotFound(detail),
        ("AccessDeniedException", _)
        | ("UnrecognizedClientException", _)
        | (_, StatusCode::UNAUTHORIZED)
        | (_, StatusCode::FORBIDDEN) => RagError::Auth {
            status,
            snippet: detail,
        },
        ("ValidationException", _) => RagError::InvalidQuery(detail),
        _ => RagError::Http {
            status,
            url: operation.to_string(),
            snippet: detail,
        },
    }
}

/// `sts:GetCallerIdentity` over the query protocol with a JSON answer.
pub struct StsClient {
    client: reqwest::Client,
    signer: SigV4Signer,
    endpoint: String,
}

impl StsClient {
    pub fn new(cfg: &RagConfig, credentials: Arc<dyn CredentialsProvider>) -> Result<Self, RagError> {
        Ok(Self {
            client: HttpPolicy::default().build_client()?,
            signer: SigV4Signer::new(cfg.region.clone(), "sts", credentials),
            endpoint: cfg.sts_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// ARN of the identity behind the current credentials.
    pub async fn caller_arn(&self) -> Result<String, RagError> {
        let mut req = self
            .client
            .post(format!("{}/", self.endpoint))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8")
            .header(ACCEPT, "application/json")
            .body("Action=GetCallerIdentity&Version=2011-06-15")
            .build()?;
        self.signer.sign(&mut req).await?;
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_json_error(status, "GetCallerIdentity", None, &text));
        }
        let v: Value = serde_json::from_str(&text)?;
        v.pointer("/GetCallerIdentityResponse/GetCallerIdentityResult/Arn")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RagError::Decode("GetCallerIdentity: no Arn in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::aws::{Credentials, StaticCredentialsProvider};
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(uri: &str) -> RagConfig {
        let mut cfg = RagConfig::new_default("error-logs-mock", "us-west-2");
        cfg.admin_endpoint = uri.to_string();
        cfg.sts_endpoint = uri.to_string();
        cfg
    }

    fn creds() -> Arc<dyn CredentialsProvider> {
        Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")))
    }

    #[tokio::test]
    async fn list_collections_sends_target_and_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", "OpenSearchServerless.ListCollections"))
            .and(header("content-type", JSON_1_0))
            .and(body_json(json!({ "collectionFilters": { "name": "error-logs-mock" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collectionSummaries": [
                    { "id": "abc", "name": "error-logs-mock", "status": "CREATING", "arn": "arn:x" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let admin = ServerlessAdmin::new(&cfg(&server.uri()), creds()).unwrap();
        let list = admin.list_collections("error-logs-mock").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, "CREATING");
    }

    #[tokio::test]
    async fn conflict_maps_to_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "ConflictException",
                "message": "Policy with name error-logs-mock-policy already exists"
            })))
            .mount(&server)
            .await;

        let admin = ServerlessAdmin::new(&cfg(&server.uri()), creds()).unwrap();
        let err = admin
            .create_security_policy("error-logs-mock-policy", SecurityPolicyType::Encryption, &json!({}))
            .await
            .unwrap_err();
        assert!(err.is_already_exists(), "{err}");
    }

    #[tokio::test]
    async fn create_collection_is_sent_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "OpenSearchServerless.CreateCollection"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "__type": "ServiceUnavailableException",
                "message": "try later"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let admin = ServerlessAdmin::new(&cfg(&server.uri()), creds()).unwrap();
        assert!(admin.create_collection("error-logs-mock", "logs").await.is_err());
    }

    #[tokio::test]
    async fn listing_is_retried_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "collectionSummaries": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let admin = ServerlessAdmin::new(&cfg(&server.uri()), creds()).unwrap();
        assert!(admin.list_collections("error-logs-mock").await.unwrap().is_empty());
    }

    #[test]
    fn namespaced_error_types_are_reduced() {
        let err = classify_json_error(
            StatusCode::BAD_REQUEST,
            "CreateCollection",
            Some("com.amazonaws.aoss#ValidationException:http://internal"),
            "{}",
        );
        assert!(matches!(err, RagError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn caller_identity_reads_arn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Action=GetCallerIdentity"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "GetCallerIdentityResponse": {
                    "GetCallerIdentityResult": {
                        "Arn": "arn:aws:iam::123456789012:role/admin",
                        "Account": "123456789012",
                        "UserId": "AROA"
                    }
                }
            })))
            .mount(&server)
            .await;

        let sts = StsClient::new(&cfg(&server.uri()), creds()).unwrap();
        assert_eq!(
            sts.caller_arn().await.unwrap(),
            "arn:aws:iam::123456789012:role/admin"
        );
    }
}
