//! Minimal S3 object upload over SigV4.

use std::{path::Path, sync::Arc};

use reqwest::header::CONTENT_TYPE;
use tracing::info;

use crate::aws::{CredentialsProvider, SigV4Signer, default_provider, region_from_env};
use crate::aws::sigv4::uri_encode;
use crate::errors::{AwsError, make_snippet};
use crate::http_policy::{HttpPolicy, send_with_retry};

/// Uploads objects to one bucket.
///
/// Addressing is virtual-hosted (`https://{bucket}.s3.{region}.amazonaws.com`)
/// unless an explicit endpoint is configured, in which case path-style
/// (`{endpoint}/{bucket}/{key}`) is used.
#[derive(Clone)]
pub struct ObjectStore {
    client: reqwest::Client,
    signer: SigV4Signer,
    bucket: String,
    endpoint: Option<String>,
    policy: HttpPolicy,
}

impl ObjectStore {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, AwsError> {
        let policy = HttpPolicy::default();
        Ok(Self {
            client: policy.build_client()?,
            signer: SigV4Signer::new(region, "s3", provider),
            bucket: bucket.into(),
            endpoint: None,
            policy,
        })
    }

    /// Switches to path-style addressing against `endpoint`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// `AWS_BUCKET_NAME` (required), `S3_ENDPOINT` (optional) and the
    /// standard region and credential variables.
    pub fn from_env() -> Result<Self, AwsError> {
        let bucket = std::env::var("AWS_BUCKET_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AwsError::Config("AWS_BUCKET_NAME is not set".into()))?;
        let store = Self::new(bucket, region_from_env(), default_provider()?)?;
        Ok(match std::env::var("S3_ENDPOINT").ok().filter(|v| !v.trim().is_empty()) {
            Some(ep) => store.with_endpoint(ep),
            None => store,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object URL for `key`.
    pub fn object_url(&self, key: &str) -> String {
        let encoded = key
            .split('/')
            .map(|seg| uri_encode(seg.as_bytes()))
            .collect::<Vec<_>>()
            .join("/");
        match &self.endpoint {
            Some(ep) => format!("{ep}/{}/{encoded}", self.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{encoded}",
                self.bucket,
                self.signer.region()
            ),
        }
    }

    /// `PUT` one object.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AwsError> {
        let url = self.object_url(key);
        let resp = send_with_retry(&self.policy, "s3.put_object", |_| {
            let body = body.clone();
            let url = url.clone();
            async move {
                let mut req = self
                    .client
                    .put(&url)
                    .header(CONTENT_TYPE, content_type)
                    .body(body)
                    .build()?;
                self.signer.sign(&mut req).await?;
                Ok::<_, AwsError>(self.client.execute(req).await?)
            }
        })
        .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AwsError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }
        Ok(())
    }

    /// Uploads a local file under its base name and returns that key.
    pub async fn upload_file(&self, path: &Path) -> Result<String, AwsError> {
        let key = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AwsError::Config(format!("no file name in {}", path.display())))?
            .to_string();
        let body = tokio::fs::read(path).await?;
        let size = body.len();
        self.put_object(&key, body, content_type_for(path)).await?;
        info!(bucket = %self.bucket, key = %key, bytes = size, "uploaded object");
        Ok(key)
    }
}

/// Content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("jsonl") | Some("ndjson") => "application/x-ndjson",
        Some("txt") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{Credentials, StaticCredentialsProvider};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(endpoint: &str) -> ObjectStore {
        let provider = Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")));
        ObjectStore::new("docs", "us-west-2", provider)
            .unwrap()
            .with_endpoint(endpoint)
    }

    #[test]
    fn virtual_hosted_url_by_default() {
        let provider = Arc::new(StaticCredentialsProvider(Credentials::new("a", "b")));
        let s = ObjectStore::new("docs", "eu-west-1", provider).unwrap();
        assert_eq!(
            s.object_url("my report.pdf"),
            "https://docs.s3.eu-west-1.amazonaws.com/my%20report.pdf"
        );
    }

    #[tokio::test]
    async fn uploads_file_under_its_base_name() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/docs/guide.pdf"))
            .and(header("content-type", "application/pdf"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-content-sha256"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("guide.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let key = store(&server.uri()).upload_file(&file).await.unwrap();
        assert_eq!(key, "guide.pdf");
    }

    #[tokio::test]
    async fn access_denied_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let err = store(&server.uri())
            .put_object("k", b"x".to_vec(), "text/plain")
            .await
            .unwrap_err();
        match err {
            AwsError::HttpStatus { status, snippet, .. } => {
                assert_eq!(status.as_u16(), 403);
                assert_eq!(snippet, "AccessDenied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a/B.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("x.bin")), "application/octet-stream");
    }
}
