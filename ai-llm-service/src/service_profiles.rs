//! Shared model service with two profiles: `generation` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Both provider clients are built eagerly, so a bad profile fails at
//!   startup instead of on the first request.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::LlmServiceProfiles;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let svc = Arc::new(LlmServiceProfiles::from_env()?);
//!
//!     let emb = svc.embed("NullPointerException in payment-service").await?;
//!     println!("dim = {}", emb.len());
//!
//!     let txt = svc.generate("Summarise the errors.", None).await?;
//!     println!("{txt}");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use services::aws::{CredentialsProvider, default_provider};

use crate::{
    config::{
        default_config::{config_embedding, config_generation},
        llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::{AiLlmError, ConfigError},
    health_service::{HealthService, HealthStatus},
    services::{
        TextStream, bedrock_service::BedrockService, ollama_service::OllamaService,
        open_ai_service::OpenAiService,
    },
};

enum ChatClient {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

enum EmbedClient {
    Bedrock(BedrockService),
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

/// Generation and embedding profiles with their ready-made clients.
///
/// The generation profile is absent for embedding-only tools.
pub struct LlmServiceProfiles {
    generation: Option<LlmModelConfig>,
    embedding: LlmModelConfig,
    chat: Option<ChatClient>,
    embedder: EmbedClient,
    health: HealthService,
}

impl LlmServiceProfiles {
    /// Builds both clients.
    ///
    /// `credentials` is only consulted by the Bedrock embedder, once per call.
    ///
    /// # Errors
    /// [`ConfigError::UnsupportedProvider`] for a Bedrock generation profile;
    /// provider validation errors from the client constructors.
    pub fn new(
        generation: LlmModelConfig,
        embedding: LlmModelConfig,
        credentials: Arc<dyn CredentialsProvider>,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let chat = match generation.provider {
            LlmProvider::Ollama => ChatClient::Ollama(OllamaService::new(generation.clone())?),
            LlmProvider::OpenAI => ChatClient::OpenAI(OpenAiService::new(generation.clone())?),
            LlmProvider::Bedrock => {
                return Err(ConfigError::UnsupportedProvider("bedrock (generation)".into()).into());
            }
        };
        let mut svc = Self::embedding_only(embedding, credentials, health_timeout_secs)?;
        svc.generation = Some(generation);
        svc.chat = Some(chat);
        Ok(svc)
    }

    /// Embedding client only; generation calls fail with
    /// [`ConfigError::MissingProfile`].
    pub fn embedding_only(
        embedding: LlmModelConfig,
        credentials: Arc<dyn CredentialsProvider>,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let embedder = match embedding.provider {
            LlmProvider::Bedrock => {
                EmbedClient::Bedrock(BedrockService::new(embedding.clone(), credentials)?)
            }
            LlmProvider::Ollama => EmbedClient::Ollama(OllamaService::new(embedding.clone())?),
            LlmProvider::OpenAI => EmbedClient::OpenAI(OpenAiService::new(embedding.clone())?),
        };

        Ok(Self {
            generation: None,
            embedding,
            chat: None,
            embedder,
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Both profiles from the environment with the default credential chain.
    pub fn from_env() -> Result<Self, AiLlmError> {
        let generation = config_generation()?;
        let embedding = config_embedding()?;
        Self::new(generation, embedding, default_provider()?, None)
    }

    /// Embedding profile from the environment with the default credential chain.
    pub fn embedding_from_env() -> Result<Self, AiLlmError> {
        Self::embedding_only(config_embedding()?, default_provider()?, None)
    }

    fn chat(&self) -> Result<&ChatClient, AiLlmError> {
        self.chat
            .as_ref()
            .ok_or_else(|| ConfigError::MissingProfile("generation").into())
    }

    /// Complete answer from the generation profile.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        match self.chat()? {
            ChatClient::Ollama(cli) => cli.chat(prompt, system).await,
            ChatClient::OpenAI(cli) => cli.generate(prompt, system).await,
        }
    }

    /// Answer fragments from the generation profile.
    ///
    /// Connection and status failures surface here; failures after the first
    /// byte arrive as the last stream item.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<TextStream, AiLlmError> {
        match self.chat()? {
            ChatClient::Ollama(cli) => cli.chat_stream(prompt, system).await,
            ChatClient::OpenAI(cli) => cli.generate_stream(prompt, system).await,
        }
    }

    /// Embeds `input` with the embedding profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match &self.embedder {
            EmbedClient::Bedrock(cli) => cli.embeddings(input).await,
            EmbedClient::Ollama(cli) => cli.embeddings(input).await,
            EmbedClient::OpenAI(cli) => cli.embeddings(input).await,
        }
    }

    /// Health snapshot of both profiles; identical profiles are probed once.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list: Vec<LlmModelConfig> = self.generation.iter().cloned().collect();
        if self.generation.as_ref() != Some(&self.embedding) {
            list.push(self.embedding.clone());
        }
        self.health.check_many(&list).await
    }

    /// `(generation, embedding)`.
    pub fn profiles(&self) -> (Option<&LlmModelConfig>, &LlmModelConfig) {
        (self.generation.as_ref(), &self.embedding)
    }
}
