//! AWS request authentication.
//!
//! Credentials for the index backend are short-lived: every outbound call asks
//! its [`CredentialsProvider`] for fresh material and signs with it. Nothing
//! here caches credentials between calls.

pub mod credentials;
pub mod imds;
pub mod profile;
pub mod sigv4;
pub mod web_identity;

pub use credentials::{
    ContainerCredentialsProvider, Credentials, CredentialsProvider, EnvCredentialsProvider,
    EnvLookup, StaticCredentialsProvider, default_provider, provider_from_lookup,
};
pub use imds::ImdsCredentialsProvider;
pub use profile::ProfileCredentialsProvider;
pub use web_identity::WebIdentityCredentialsProvider;
pub use sigv4::SigV4Signer;

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Resolves the region from `AWS_REGION`, then `AWS_DEFAULT_REGION`.
pub fn region_from_env() -> String {
    region_from_lookup(&credentials::non_empty_env)
}

pub fn region_from_lookup(get: EnvLookup<'_>) -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .iter()
        .find_map(|k| get(k))
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}
