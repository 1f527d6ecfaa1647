//! Sequential provisioning of a vector-search collection and its index.
//!
//! Steps run in a fixed order. A resource that already exists is recorded as
//! [`StepOutcome::AlreadyExisted`] and the flow moves on; any other failure
//! stops the run. Completed steps are never rolled back.

use std::{fmt, sync::Arc};

use serde_json::{Value, json};
use services::aws::CredentialsProvider;
use thiserror::Error;
use tracing::{info, warn};

use crate::admin::{SecurityPolicyType, ServerlessAdmin, StsClient};
use crate::config::RagConfig;
use crate::discovery::resolve_endpoint;
use crate::errors::RagError;
use crate::mapping::index_mapping;
use crate::opensearch_facade::OpenSearchFacade;

const COLLECTION_DESCRIPTION: &str = "Error logs for RAG with vector search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    EncryptionPolicy,
    Collection,
    NetworkPolicy,
    AccessPolicy,
    IndexMapping,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvisionStep::EncryptionPolicy => "encryption policy",
            ProvisionStep::Collection => "collection",
            ProvisionStep::NetworkPolicy => "network policy",
            ProvisionStep::AccessPolicy => "data access policy",
            ProvisionStep::IndexMapping => "index mapping",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyExisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: ProvisionStep,
    pub outcome: StepOutcome,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub steps: Vec<StepReport>,
    /// Data-plane endpoint of the collection.
    pub endpoint: String,
}

/// A step failed; `completed` lists what was done before it.
#[derive(Debug, Error)]
#[error("provisioning failed at {step}: {source}")]
pub struct ProvisionError {
    pub step: ProvisionStep,
    pub completed: Vec<StepReport>,
    #[source]
    pub source: RagError,
}

/// Drives the control plane, STS and the data plane for one collection.
pub struct Provisioner {
    cfg: RagConfig,
    admin: ServerlessAdmin,
    sts: StsClient,
    credentials: Arc<dyn CredentialsProvider>,
}

impl Provisioner {
    pub fn new(cfg: RagConfig, credentials: Arc<dyn CredentialsProvider>) -> Result<Self, RagError> {
        cfg.validate()?;
        Ok(Self {
            admin: ServerlessAdmin::new(&cfg, credentials.clone())?,
            sts: StsClient::new(&cfg, credentials.clone())?,
            cfg,
            credentials,
        })
    }

    pub async fn run(&self) -> Result<ProvisionReport, ProvisionError> {
        let name = self.cfg.collection.as_str();
        let mut done: Vec<StepReport> = Vec::with_capacity(5);

        let outcome = self
            .admin
            .create_security_policy(
                &format!("{name}-policy"),
                SecurityPolicyType::Encryption,
                &encryption_policy(name),
            )
            .await;
        record(&mut done, ProvisionStep::EncryptionPolicy, outcome)?;

        let outcome = self.admin.create_collection(name, COLLECTION_DESCRIPTION).await;
        record(&mut done, ProvisionStep::Collection, outcome)?;
        if let Err(source) = self.wait_until_active().await {
            return Err(fail(done, ProvisionStep::Collection, source));
        }

        let outcome = self
            .admin
            .create_security_policy(
                &format!("{name}-network"),
                SecurityPolicyType::Network,
                &network_policy(name),
            )
            .await;
        record(&mut done, ProvisionStep::NetworkPolicy, outcome)?;

        let outcome = match self.principal().await {
            Ok(principal) => {
                self.admin
                    .create_access_policy(&format!("{name}-access"), &access_policy(name, &principal))
                    .await
            }
            Err(e) => Err(e),
        };
        record(&mut done, ProvisionStep::AccessPolicy, outcome)?;

        let endpoint = match resolve_endpoint(&self.cfg, &self.admin).await {
            Ok(ep) => ep,
            Err(source) => return Err(fail(done, ProvisionStep::IndexMapping, source)),
        };
        let outcome = match OpenSearchFacade::new(&self.cfg, endpoint.clone(), self.credentials.clone()) {
            Ok(facade) => facade.create_index(&index_mapping(self.cfg.space)).await,
            Err(e) => Err(e),
        };
        record(&mut done, ProvisionStep::IndexMapping, outcome)?;

        info!(collection = %name, %endpoint, "provisioning complete");
        Ok(ProvisionReport {
            steps: done,
            endpoint,
        })
    }

    /// Polls `ListCollections` until the collection reports `ACTIVE`.
    ///
    /// There is no upper bound on the wait; `FAILED` ends it with an error.
    async fn wait_until_active(&self) -> Result<(), RagError> {
        let name = &self.cfg.collection;
        loop {
            let status = self
                .admin
                .list_collections(name)
                .await?
                .into_iter()
                .find(|c| &c.name == name)
                .map(|c| c.status);
            match status.as_deref() {
                Some("ACTIVE") => {
                    info!(collection = %name, "collection is active");
                    return Ok(());
                }
                Some("FAILED") => {
                    return Err(RagError::Config(format!("collection {name} failed to create")));
                }
                other => {
                    info!(collection = %name, status = other.unwrap_or("absent"), "waiting for collection");
                    tokio::time::sleep(self.cfg.poll_interval).await;
                }
            }
        }
    }

    async fn principal(&self) -> Result<String, RagError> {
        match &self.cfg.principal_arn {
            Some(arn) => Ok(arn.clone()),
            None => self.sts.caller_arn().await,
        }
    }
}

fn record(
    done: &mut Vec<StepReport>,
    step: ProvisionStep,
    result: Result<(), RagError>,
) -> Result<(), ProvisionError> {
    let outcome = match result {
        Ok(()) => StepOutcome::Created,
        Err(e) if e.is_already_exists() => {
            warn!(%step, "already exists, continuing");
            StepOutcome::AlreadyExisted
        }
        Err(source) => return Err(fail(std::mem::take(done), step, source)),
    };
    info!(%step, ?outcome, "provisioning step finished");
    done.push(StepReport { step, outcome });
    Ok(())
}

fn fail(completed: Vec<StepReport>, step: ProvisionStep, source: RagError) -> ProvisionError {
    ProvisionError {
        step,
        completed,
        source,
    }
}

pub fn encryption_policy(collection: &str) -> Value {
    json!({
        "Rules": [{ "ResourceType": "collection", "Resource": [format!("collection/{collection}")] }],
        "AWSOwnedKey": true
    })
}

pub fn network_policy(collection: &str) -> Value {
    json!([{
        "Rules": [{ "ResourceType": "collection", "Resource": [format!("collection/{collection}")] }],
        "AllowFromPublic": true
    }])
}

pub fn access_policy(collection: &str, principal: &str) -> Value {
    json!([{
        "Rules": [
            {
                "ResourceType": "index",
                "Resource": [format!("index/{collection}/*")],
                "Permission": ["aoss:*"]
            },
            {
                "ResourceType": "collection",
                "Resource": [format!("collection/{collection}")],
                "Permission": ["aoss:*"]
            }
        ],
        "Principal": [principal]
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::aws::{Credentials, StaticCredentialsProvider};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(op: &str) -> impl wiremock::Match + 'static {
        header("x-amz-target", format!("OpenSearchServerless.{op}").as_str())
    }

    fn provisioner(uri: &str) -> Provisioner {
        let mut cfg = RagConfig::new_default("error-logs-mock", "us-west-2");
        cfg.admin_endpoint = uri.to_string();
        cfg.endpoint = Some(uri.to_string());
        cfg.principal_arn = Some("arn:aws:iam::1:role/admin".into());
        cfg.poll_interval = Duration::from_millis(5);
        let creds = Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")));
        Provisioner::new(cfg, creds).unwrap()
    }

    async fn conflict(server: &MockServer, op: &str) {
        Mock::given(method("POST"))
            .and(target(op))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "ConflictException", "message": "exists"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn existing_resources_do_not_stop_the_run() {
        let server = MockServer::start().await;
        conflict(&server, "CreateSecurityPolicy").await;
        conflict(&server, "CreateCollection").await;
        conflict(&server, "CreateAccessPolicy").await;
        Mock::given(method("POST"))
            .and(target("ListCollections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collectionSummaries": [{ "id": "c1", "name": "error-logs-mock", "status": "ACTIVE" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/error-logs-mock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
            .expect(1)
            .mount(&server)
            .await;

        let report = provisioner(&server.uri()).run().await.unwrap();
        let outcomes: Vec<_> = report.steps.iter().map(|s| s.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                StepOutcome::AlreadyExisted,
                StepOutcome::AlreadyExisted,
                StepOutcome::AlreadyExisted,
                StepOutcome::AlreadyExisted,
                StepOutcome::Created,
            ]
        );
    }

    #[tokio::test]
    async fn other_failures_abort_remaining_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(target("CreateSecurityPolicy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(target("CreateCollection"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "__type": "AccessDeniedException", "message": "no"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(target("CreateAccessPolicy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provisioner(&server.uri()).run().await.unwrap_err();
        assert_eq!(err.step, ProvisionStep::Collection);
        assert_eq!(err.completed.len(), 1);
        assert!(matches!(err.source, RagError::Auth { .. }));
    }

    #[test]
    fn access_policy_binds_principal() {
        let p = access_policy("c", "arn:x");
        assert_eq!(p[0]["Principal"][0], "arn:x");
        assert_eq!(p[0]["Rules"][0]["Resource"][0], "index/c/*");
    }
}
