//! Fingerprint policy storage and on-demand evaluation.

use std::sync::Arc;

use profilehub_core::clock::Clock;
use profilehub_core::error::CoreError;
use profilehub_core::fingerprint::{
    evaluate_policy, select_versions, FingerprintPolicy, FingerprintVersion, PolicyEvaluation,
    Resource,
};
use profilehub_core::store::DirectoryStore;
use profilehub_events::{event_types, EventBus, PlatformEvent};

use crate::config::CoordinatorConfig;
use crate::retry::RetryPolicy;

pub struct FingerprintPolicyEngine {
    directory: Arc<dyn DirectoryStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl FingerprintPolicyEngine {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            directory,
            events,
            clock,
            retry: RetryPolicy::new(config.store_retry_backoff),
        }
    }

    /// Evaluate a resource against a policy and announce violations.
    pub async fn evaluate(
        &self,
        policy_id: &str,
        resource_id: &str,
    ) -> Result<PolicyEvaluation, CoreError> {
        let policy = self.get_policy(policy_id).await?;
        let resource = self.get_resource(resource_id).await?;
        let evaluation = self.evaluate_resource(&policy, &resource).await?;

        if evaluation.is_compliant() {
            tracing::debug!(policy_id, resource_id, "Resource compliant");
        } else {
            tracing::info!(
                policy_id,
                resource_id,
                details = ?evaluation.details,
                auto_remediable = evaluation.auto_remediation.is_some(),
                "Policy violation"
            );
            self.events.publish(
                PlatformEvent::new(event_types::POLICY_VIOLATION)
                    .with_resource(resource_id)
                    .with_team(resource.team_id.clone())
                    .with_payload(serde_json::json!({
                        "policy_id": policy_id,
                        "details": evaluation.details,
                        "auto_remediation": evaluation.auto_remediation,
                    }))
                    .at(evaluation.evaluated_at),
            );
        }
        Ok(evaluation)
    }

    /// Evaluate without publishing anything. Used by health aggregation.
    pub async fn evaluate_resource(
        &self,
        policy: &FingerprintPolicy,
        resource: &Resource,
    ) -> Result<PolicyEvaluation, CoreError> {
        let versions = self.versions(&resource.id).await?;
        let (current, latest) = select_versions(resource, &versions)?;
        Ok(evaluate_policy(
            policy,
            resource,
            current,
            latest,
            self.clock.now(),
        ))
    }

    /// Validate and store a policy, replacing any with the same id.
    pub async fn put_policy(&self, policy: FingerprintPolicy) -> Result<FingerprintPolicy, CoreError> {
        let policy = policy.validated()?;
        let directory = &self.directory;
        let stored = &policy;
        self.retry
            .run("put_policy", move || directory.put_policy(stored))
            .await?;
        tracing::info!(policy_id = %policy.id, team_id = %policy.team_id, "Policy stored");
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: &str) -> Result<FingerprintPolicy, CoreError> {
        let directory = &self.directory;
        self.retry
            .run("get_policy", move || directory.get_policy(policy_id))
            .await?
            .ok_or_else(|| CoreError::not_found("fingerprint_policy", policy_id))
    }

    pub async fn get_resource(&self, resource_id: &str) -> Result<Resource, CoreError> {
        let directory = &self.directory;
        self.retry
            .run("get_resource", move || directory.get_resource(resource_id))
            .await?
            .ok_or_else(|| CoreError::not_found("resource", resource_id))
    }

    async fn versions(&self, resource_id: &str) -> Result<Vec<FingerprintVersion>, CoreError> {
        let directory = &self.directory;
        self.retry
            .run("fingerprint_versions", move || {
                directory.fingerprint_versions(resource_id)
            })
            .await
    }
}
