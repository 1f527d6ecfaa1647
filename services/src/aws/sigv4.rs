//! AWS Signature Version 4 for `reqwest::Request`.
//!
//! Signed headers are `host`, `content-type` (when present) and every
//! `x-amz-*` header. Anything reqwest adds at send time (`accept`,
//! `content-length`, ...) stays unsigned, which SigV4 permits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::aws::credentials::{Credentials, CredentialsProvider};
use crate::errors::AwsError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

/// Signs requests for one `(region, service)` pair with credentials obtained
/// from the injected provider at signing time.
#[derive(Clone)]
pub struct SigV4Signer {
    region: String,
    service: String,
    provider: Arc<dyn CredentialsProvider>,
    content_sha256_header: bool,
}

impl SigV4Signer {
    pub fn new(
        region: impl Into<String>,
        service: impl Into<String>,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Self {
        let service = service.into();
        // S3 refuses requests without the payload hash header.
        let content_sha256_header = service == "s3";
        Self {
            region: region.into(),
            service,
            provider,
            content_sha256_header,
        }
    }

    /// Forces (or suppresses) the `x-amz-content-sha256` header.
    pub fn with_content_sha256_header(mut self, on: bool) -> Self {
        self.content_sha256_header = on;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Fetches fresh credentials and signs `req` in place.
    ///
    /// # Errors
    /// Credential resolution failures and [`AwsError::Signing`] for requests
    /// that cannot be canonicalized (streaming bodies, URLs without host).
    pub async fn sign(&self, req: &mut reqwest::Request) -> Result<(), AwsError> {
        let creds = self.provider.credentials().await?;
        self.sign_with(&creds, req, Utc::now())
    }

    /// Deterministic signing with explicit credentials and clock.
    pub fn sign_with(
        &self,
        creds: &Credentials,
        req: &mut reqwest::Request,
        now: DateTime<Utc>,
    ) -> Result<(), AwsError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let payload: &[u8] = match req.body() {
            None => &[],
            Some(body) => body
                .as_bytes()
                .ok_or_else(|| AwsError::Signing("streaming bodies cannot be signed".into()))?,
        };
        let payload_hash = hex::encode(Sha256::digest(payload));
        let host = host_header(req.url())?;

        let headers = req.headers_mut();
        headers.insert(X_AMZ_DATE, header_value(&amz_date)?);
        if let Some(token) = &creds.session_token {
            headers.insert(X_AMZ_SECURITY_TOKEN, header_value(token)?);
        }
        if self.content_sha256_header {
            headers.insert(X_AMZ_CONTENT_SHA256, header_value(&payload_hash)?);
        }

        let (canonical, signed_headers) =
            canonical_request(req, &host, &payload_hash, self.service != "s3")?;
        trace!(service = %self.service, canonical = %canonical, "sigv4 canonical request");

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let key = signing_key(&creds.secret_access_key, &date, &self.region, &self.service)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            creds.access_key_id
        );
        req.headers_mut()
            .insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

/// Derives the per-day signing key.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, AwsError> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AwsError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AwsError::Signing(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(v: &str) -> Result<HeaderValue, AwsError> {
    HeaderValue::from_str(v).map_err(|e| AwsError::Signing(format!("invalid header value: {e}")))
}

fn host_header(url: &reqwest::Url) -> Result<String, AwsError> {
    let host = url
        .host_str()
        .ok_or_else(|| AwsError::Signing(format!("URL without host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Builds the canonical request and the `SignedHeaders` list.
fn canonical_request(
    req: &reqwest::Request,
    host: &str,
    payload_hash: &str,
    double_encode: bool,
) -> Result<(String, String), AwsError> {
    let mut headers: Vec<(String, String)> = vec![("host".to_string(), host.to_string())];
    for (name, value) in req.headers() {
        if !is_signed_header(name) {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|e| AwsError::Signing(format!("non-ASCII header {name}: {e}")))?;
        headers.push((name.as_str().to_string(), collapse_whitespace(value)));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        req.method().as_str(),
        canonical_uri(req.url().path(), double_encode),
        canonical_query(req.url()),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    Ok((canonical, signed_headers))
}

fn is_signed_header(name: &HeaderName) -> bool {
    let n = name.as_str();
    n == "content-type" || n.starts_with("x-amz-")
}

fn collapse_whitespace(v: &str) -> String {
    v.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every service except S3 expects each path segment encoded twice.
fn canonical_uri(path: &str, double_encode: bool) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let once = uri_encode(&percent_decode(segment));
            if double_encode {
                uri_encode(once.as_bytes())
            } else {
                once
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &reqwest::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(k.as_bytes()), uri_encode(v.as_bytes())))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 encoding that keeps only unreserved characters.
pub fn uri_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::credentials::StaticCredentialsProvider;
    use chrono::TimeZone;

    fn example_creds() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
    }

    fn signer(service: &str) -> SigV4Signer {
        SigV4Signer::new(
            "us-east-1",
            service,
            Arc::new(StaticCredentialsProvider(example_creds())),
        )
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn signs_get_vanilla_reference_request() {
        let mut req = reqwest::Client::new()
            .get("https://example.amazonaws.com/")
            .build()
            .unwrap();
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        signer("service")
            .sign_with(&example_creds(), &mut req, now)
            .unwrap();

        let auth = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(req.headers()[X_AMZ_DATE], "20150830T123600Z");
    }

    #[test]
    fn session_token_and_content_type_are_signed() {
        let mut req = reqwest::Client::new()
            .post("https://collection.us-east-1.aoss.amazonaws.com/logs/_search")
            .json(&serde_json::json!({"size": 1}))
            .build()
            .unwrap();
        let creds = example_creds().with_session_token("SESSION");
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        signer("aoss").sign_with(&creds, &mut req, now).unwrap();

        let auth = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token,"));
        assert_eq!(req.headers()[X_AMZ_SECURITY_TOKEN], "SESSION");
        assert!(req.headers().get(X_AMZ_CONTENT_SHA256).is_none());
    }

    #[test]
    fn s3_requests_carry_payload_hash() {
        let mut req = reqwest::Client::new()
            .put("https://bucket.s3.us-east-1.amazonaws.com/report.pdf")
            .body(Vec::<u8>::new())
            .build()
            .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        signer("s3").sign_with(&example_creds(), &mut req, now).unwrap();

        assert_eq!(
            req.headers()[X_AMZ_CONTENT_SHA256],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let auth = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date,"));
    }

    #[test]
    fn canonical_uri_double_encodes_outside_s3() {
        assert_eq!(
            canonical_uri("/model/anthropic.claude-v2:1/invoke", true),
            "/model/anthropic.claude-v2%253A1/invoke"
        );
        assert_eq!(
            canonical_uri("/bucket/my%20file.pdf", false),
            "/bucket/my%20file.pdf"
        );
        assert_eq!(canonical_uri("", true), "/");
    }

    #[test]
    fn canonical_query_is_sorted_and_encoded() {
        let url = reqwest::Url::parse("https://h/?b=2&a=x y&a=1").unwrap();
        assert_eq!(canonical_query(&url), "a=1&a=x%20y&b=2");
    }
}
