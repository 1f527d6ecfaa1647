//! Shared plumbing for the crates that talk to AWS-hosted collaborators.
//!
//! - [`aws`]: short-lived credential providers and SigV4 request signing
//! - [`http_policy`]: connect/read budgets and the bounded retry loop
//! - [`sse`]: incremental `text/event-stream` decoder
//! - [`s3`]: single-object upload into a bucket

pub mod aws;
pub mod errors;
pub mod http_policy;
pub mod s3;
pub mod sse;

pub use errors::AwsError;
