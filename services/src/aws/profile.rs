//! Static keys from the shared `~/.aws/credentials` and `~/.aws/config` files.
//!
//! Only `aws_access_key_id`, `aws_secret_access_key` and `aws_session_token`
//! are honoured. The files are parsed again on every call so `aws configure`
//! edits apply without a restart.

use std::path::{Path, PathBuf};

use super::credentials::{Credentials, CredentialsFuture, CredentialsProvider, EnvLookup};
use crate::errors::AwsError;

const DEFAULT_PROFILE: &str = "default";

#[derive(Clone, Debug)]
pub struct ProfileCredentialsProvider {
    profile: String,
    credentials_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl ProfileCredentialsProvider {
    pub fn new(
        profile: impl Into<String>,
        credentials_file: Option<PathBuf>,
        config_file: Option<PathBuf>,
    ) -> Self {
        Self {
            profile: profile.into(),
            credentials_file,
            config_file,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Present when the selected profile (`AWS_PROFILE`, else `default`)
    /// carries an access key in either file.
    ///
    /// `AWS_SHARED_CREDENTIALS_FILE` and `AWS_CONFIG_FILE` override the
    /// locations under the home directory.
    pub fn from_lookup(get: EnvLookup<'_>) -> Option<Self> {
        let home = dirs::home_dir().map(|h| h.join(".aws"));
        let credentials_file = get("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| home.as_ref().map(|h| h.join("credentials")));
        let config_file = get("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .or_else(|| home.as_ref().map(|h| h.join("config")));
        let profile = get("AWS_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let provider = Self::new(profile, credentials_file, config_file);
        provider.read().ok().map(|_| provider)
    }

    fn read(&self) -> Result<Credentials, AwsError> {
        let from_credentials = self
            .credentials_file
            .as_deref()
            .and_then(read_optional)
            .and_then(|text| profile_keys(&text, &self.profile, false));
        let from_config = || {
            self.config_file
                .as_deref()
                .and_then(read_optional)
                .and_then(|text| profile_keys(&text, &self.profile, true))
        };

        from_credentials.or_else(from_config).ok_or_else(|| {
            AwsError::Config(format!("profile `{}` has no static credentials", self.profile))
        })
    }
}

impl CredentialsProvider for ProfileCredentialsProvider {
    fn credentials(&self) -> CredentialsFuture<'_> {
        Box::pin(async move { self.read() })
    }
}

fn read_optional(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Keys of one profile. In the config file every profile except `default`
/// is written as `[profile name]`.
fn profile_keys(text: &str, profile: &str, config_syntax: bool) -> Option<Credentials> {
    let mut in_section = false;
    let mut access = None;
    let mut secret = None;
    let mut token = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = section_name(header.trim(), config_syntax) == Some(profile);
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "aws_access_key_id" => access = Some(value),
            "aws_secret_access_key" => secret = Some(value),
            "aws_session_token" => token = Some(value),
            _ => {}
        }
    }

    let mut creds = Credentials::new(access?, secret?);
    creds.session_token = token.filter(|t| !t.is_empty());
    Some(creds)
}

fn section_name(header: &str, config_syntax: bool) -> Option<&str> {
    if !config_syntax {
        return Some(header);
    }
    match header.strip_prefix("profile") {
        Some(rest) if rest.starts_with(char::is_whitespace) => Some(rest.trim()),
        _ if header == DEFAULT_PROFILE => Some(header),
        _ => None,
    }
}
