//! Fingerprint upgrade policy and its evaluation.
//!
//! A team policy bounds how many fingerprint generations a resource may lag
//! behind the latest (separately for desktop and mobile) and which browser
//! engines are allowed. Evaluation is pure: the caller loads the policy, the
//! resource and its fingerprint versions and passes them in.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{PolicyId, ResourceId, TeamId, Timestamp};

/// Tags that mark a resource as a mobile profile regardless of OS.
const MOBILE_TAGS: &[&str] = &["mobile", "android", "ios"];

/// Operating systems that make a resource a mobile profile.
const MOBILE_OSES: &[&str] = &["android", "ios"];

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A shared browser profile as seen by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub team_id: TeamId,
    pub tags: Vec<String>,
    /// Browser engine the profile emulates, e.g. `"chrome"`.
    pub browser: String,
    /// Emulated operating system, e.g. `"windows"` or `"android"`.
    pub os: String,
    /// Fingerprint generation the profile currently runs.
    pub fingerprint_version: i64,
    /// Policy this profile is judged against, if any.
    pub policy_id: Option<PolicyId>,
}

/// One generation of a resource's simulated browser signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintVersion {
    pub resource_id: ResourceId,
    pub version: i64,
    pub browser_version: String,
    pub created_at: Timestamp,
    pub is_latest: bool,
}

/// Team-configured upgrade rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintPolicy {
    pub id: PolicyId,
    /// Team whose admins own the policy.
    pub team_id: TeamId,
    pub max_versions_behind_desktop: i64,
    pub max_versions_behind_mobile: i64,
    /// Lower-case browser names. Empty means any browser is allowed.
    pub allowed_browsers: BTreeSet<String>,
    pub auto_upgrade: bool,
}

impl FingerprintPolicy {
    /// Reject malformed thresholds and normalize browser names to lower case.
    pub fn validated(mut self) -> Result<Self, CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Validation("Policy id must not be empty".into()));
        }
        if self.max_versions_behind_desktop < 0 {
            return Err(CoreError::Validation(format!(
                "max_versions_behind_desktop must not be negative, got {}",
                self.max_versions_behind_desktop
            )));
        }
        if self.max_versions_behind_mobile < 0 {
            return Err(CoreError::Validation(format!(
                "max_versions_behind_mobile must not be negative, got {}",
                self.max_versions_behind_mobile
            )));
        }
        if self.allowed_browsers.iter().any(|b| b.trim().is_empty()) {
            return Err(CoreError::Validation(
                "allowed_browsers must not contain empty names".into(),
            ));
        }
        self.allowed_browsers = self
            .allowed_browsers
            .iter()
            .map(|b| b.trim().to_lowercase())
            .collect();
        Ok(self)
    }

    pub fn limit_for(&self, class: DeviceClass) -> i64 {
        match class {
            DeviceClass::Desktop => self.max_versions_behind_desktop,
            DeviceClass::Mobile => self.max_versions_behind_mobile,
        }
    }

    pub fn allows_browser(&self, browser: &str) -> bool {
        self.allowed_browsers.is_empty()
            || self
                .allowed_browsers
                .contains(&browser.trim().to_lowercase())
    }
}

/// Device class used to pick the lag threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

impl DeviceClass {
    /// Mobile if the OS or any tag says so, desktop otherwise.
    pub fn classify(resource: &Resource) -> Self {
        let os = resource.os.to_lowercase();
        let tagged_mobile = resource
            .tags
            .iter()
            .any(|t| MOBILE_TAGS.contains(&t.to_lowercase().as_str()));
        if MOBILE_OSES.contains(&os.as_str()) || tagged_mobile {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Verdict of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Violation,
}

/// A single failing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum PolicyFinding {
    VersionLag { versions_behind: i64, limit: i64 },
    BrowserNotAllowed { browser: String },
}

/// Recommendation attached to a violation that an upgrade alone would fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRemediation {
    pub upgrade_to_version: i64,
    pub browser_version: String,
}

/// Structured compliance report for one resource against one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub policy_id: PolicyId,
    pub resource_id: ResourceId,
    pub status: ComplianceStatus,
    /// Human-readable reasons, one per failing check, in check order.
    pub details: Vec<String>,
    pub findings: Vec<PolicyFinding>,
    pub device_class: DeviceClass,
    pub versions_behind: i64,
    /// Present only when the sole failure is version lag and the policy
    /// enables auto-upgrade.
    pub auto_remediation: Option<AutoRemediation>,
    pub evaluated_at: Timestamp,
}

impl PolicyEvaluation {
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

/// Pick the running and the latest version out of a resource's history.
///
/// The running version is the one matching `resource.fingerprint_version`.
/// The latest is the one flagged `is_latest`, falling back to the highest
/// version number.
pub fn select_versions<'a>(
    resource: &Resource,
    versions: &'a [FingerprintVersion],
) -> Result<(&'a FingerprintVersion, &'a FingerprintVersion), CoreError> {
    let current = versions
        .iter()
        .find(|v| v.version == resource.fingerprint_version)
        .ok_or_else(|| {
            CoreError::not_found(
                "fingerprint_version",
                format!("{}@{}", resource.id, resource.fingerprint_version),
            )
        })?;
    let latest = versions
        .iter()
        .find(|v| v.is_latest)
        .or_else(|| versions.iter().max_by_key(|v| v.version))
        .ok_or_else(|| CoreError::not_found("fingerprint_version", resource.id.clone()))?;
    Ok((current, latest))
}

/// Evaluate `resource` against `policy`.
///
/// Checks run in a fixed order (version lag, then browser) so that `details`
/// is stable for identical inputs.
pub fn evaluate_policy(
    policy: &FingerprintPolicy,
    resource: &Resource,
    current: &FingerprintVersion,
    latest: &FingerprintVersion,
    now: Timestamp,
) -> PolicyEvaluation {
    let device_class = DeviceClass::classify(resource);
    let versions_behind = (latest.version - current.version).max(0);
    let limit = policy.limit_for(device_class);

    let mut findings = Vec::new();
    if versions_behind > limit {
        findings.push(PolicyFinding::VersionLag {
            versions_behind,
            limit,
        });
    }
    if !policy.allows_browser(&resource.browser) {
        findings.push(PolicyFinding::BrowserNotAllowed {
            browser: resource.browser.clone(),
        });
    }

    let details = findings
        .iter()
        .map(|f| describe_finding(f, policy))
        .collect();

    let only_lag = matches!(findings.as_slice(), [PolicyFinding::VersionLag { .. }]);
    let auto_remediation = (policy.auto_upgrade && only_lag).then(|| AutoRemediation {
        upgrade_to_version: latest.version,
        browser_version: latest.browser_version.clone(),
    });

    let status = if findings.is_empty() {
        ComplianceStatus::Compliant
    } else {
        ComplianceStatus::Violation
    };

    PolicyEvaluation {
        policy_id: policy.id.clone(),
        resource_id: resource.id.clone(),
        status,
        details,
        findings,
        device_class,
        versions_behind,
        auto_remediation,
        evaluated_at: now,
    }
}

fn describe_finding(finding: &PolicyFinding, policy: &FingerprintPolicy) -> String {
    match finding {
        PolicyFinding::VersionLag {
            versions_behind,
            limit,
        } => format!("versions behind: {versions_behind} exceeds limit: {limit}"),
        PolicyFinding::BrowserNotAllowed { browser } => {
            let allowed: Vec<&str> = policy.allowed_browsers.iter().map(String::as_str).collect();
            format!(
                "browser '{browser}' is not allowed (allowed: {})",
                allowed.join(", ")
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
