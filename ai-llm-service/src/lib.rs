//! Model clients shared by the server and the admin tooling.
//!
//! Two profiles are wired at startup: **generation** (chat completions, plain
//! or streamed) and **embedding** (text to vector). Each profile is backed by a
//! concrete provider client built once and reused for every call.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::{AiLlmError, Result};
pub use health_service::{HealthService, HealthStatus};
pub use service_profiles::LlmServiceProfiles;
pub use services::TextStream;
