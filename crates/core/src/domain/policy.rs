use serde::{Deserialize, Serialize};

use crate::domain::request::RequestKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(pub i64);

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the server does with a request that violates the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationAction {
    AutoReject,
    Flag,
    NeedsReview,
    AutoApprove,
}

wire_labels!(ViolationAction {
    AutoReject => "AUTO_REJECT",
    Flag => "FLAG",
    NeedsReview => "NEEDS_REVIEW",
    AutoApprove => "AUTO_APPROVE",
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PolicyId>,
    pub request_type: RequestKind,
    pub policy_key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_grade: Option<String>,
    pub violation_action: ViolationAction,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Create/update payload: a policy without its server-assigned id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub request_type: RequestKind,
    pub policy_key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_grade: Option<String>,
    pub violation_action: ViolationAction,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl PolicyDraft {
    pub fn into_policy(self, id: PolicyId) -> Policy {
        Policy {
            id: Some(id),
            request_type: self.request_type,
            policy_key: self.policy_key,
            value: self.value,
            policy_grade: self.policy_grade,
            violation_action: self.violation_action,
            is_active: self.is_active,
        }
    }
}

impl From<Policy> for PolicyDraft {
    fn from(policy: Policy) -> Self {
        Self {
            request_type: policy.request_type,
            policy_key: policy.policy_key,
            value: policy.value,
            policy_grade: policy.policy_grade,
            violation_action: policy.violation_action,
            is_active: policy.is_active,
        }
    }
}
