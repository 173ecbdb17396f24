use approvly_core::config::LoadOptions;
use approvly_core::domain::policy::{PolicyDraft, PolicyId, ViolationAction};
use approvly_core::domain::request::RequestKind;
use clap::{Args, Subcommand};

use crate::commands::{execute, CommandResult, Reply};

#[derive(Debug, Clone, Subcommand)]
pub enum PoliciesCommand {
    #[command(about = "List configured policies (admin only)")]
    List,
    #[command(about = "Show one policy")]
    Show { id: i64 },
    #[command(about = "Create a policy")]
    Create(CreatePolicyArgs),
    #[command(about = "Change fields of an existing policy; omitted fields keep their value")]
    Update(UpdatePolicyArgs),
    #[command(about = "Delete a policy")]
    Delete { id: i64 },
}

#[derive(Debug, Clone, Args)]
pub struct CreatePolicyArgs {
    #[arg(long = "request-type")]
    pub request_type: RequestKind,
    #[arg(long)]
    pub key: String,
    #[arg(long)]
    pub value: String,
    #[arg(long)]
    pub grade: Option<String>,
    #[arg(long = "violation-action", help = "AUTO_REJECT, FLAG, NEEDS_REVIEW or AUTO_APPROVE")]
    pub violation_action: ViolationAction,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Debug, Clone, Args)]
pub struct UpdatePolicyArgs {
    pub id: i64,
    #[arg(long = "request-type")]
    pub request_type: Option<RequestKind>,
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long)]
    pub value: Option<String>,
    #[arg(long)]
    pub grade: Option<String>,
    #[arg(long = "violation-action")]
    pub violation_action: Option<ViolationAction>,
    #[arg(long, conflicts_with = "deactivate")]
    pub activate: bool,
    #[arg(long)]
    pub deactivate: bool,
}

impl From<CreatePolicyArgs> for PolicyDraft {
    fn from(args: CreatePolicyArgs) -> Self {
        Self {
            request_type: args.request_type,
            policy_key: args.key,
            value: args.value,
            policy_grade: args.grade.filter(|grade| !grade.trim().is_empty()),
            violation_action: args.violation_action,
            is_active: !args.inactive,
        }
    }
}

impl UpdatePolicyArgs {
    fn apply(self, mut draft: PolicyDraft) -> PolicyDraft {
        if let Some(request_type) = self.request_type {
            draft.request_type = request_type;
        }
        if let Some(key) = self.key {
            draft.policy_key = key;
        }
        if let Some(value) = self.value {
            draft.value = value;
        }
        if let Some(grade) = self.grade {
            draft.policy_grade = (!grade.trim().is_empty()).then_some(grade);
        }
        if let Some(violation_action) = self.violation_action {
            draft.violation_action = violation_action;
        }
        if self.activate {
            draft.is_active = true;
        }
        if self.deactivate {
            draft.is_active = false;
        }
        draft
    }
}

pub fn run(options: LoadOptions, command: PoliciesCommand) -> CommandResult {
    match command {
        PoliciesCommand::List => execute("policies.list", options, |context| async move {
            let policies = context.policies().list().await?;
            Ok(Reply::new(format!("{} policies", policies.len())).with_data(&policies))
        }),
        PoliciesCommand::Show { id } => execute("policies.show", options, |context| async move {
            let policy = context.policies().get(PolicyId(id)).await?;
            Ok(Reply::new(format!("policy {id}: {}", policy.policy_key)).with_data(&policy))
        }),
        PoliciesCommand::Create(args) => {
            execute("policies.create", options, |context| async move {
                let created = context.policies().create(&args.into()).await?;
                Ok(Reply::new(format!("created policy `{}`", created.policy_key))
                    .with_data(&created))
            })
        }
        PoliciesCommand::Update(args) => {
            execute("policies.update", options, |context| async move {
                let id = PolicyId(args.id);
                let store = context.policies();
                let current = store.get(id).await?;
                let updated = store.update(id, &args.apply(current.into())).await?;
                Ok(Reply::new(format!("updated policy {id}")).with_data(&updated))
            })
        }
        PoliciesCommand::Delete { id } => {
            execute("policies.delete", options, |context| async move {
                context.policies().delete(PolicyId(id)).await?;
                Ok(Reply::new(format!("deleted policy {id}")))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use approvly_core::domain::policy::{PolicyDraft, ViolationAction};
    use approvly_core::domain::request::RequestKind;

    use super::UpdatePolicyArgs;

    fn draft() -> PolicyDraft {
        PolicyDraft {
            request_type: RequestKind::Expense,
            policy_key: "max_amount".to_string(),
            value: "500".to_string(),
            policy_grade: Some("GRADE2".to_string()),
            violation_action: ViolationAction::NeedsReview,
            is_active: true,
        }
    }

    #[test]
    fn update_keeps_omitted_fields_and_clears_blank_grade() {
        let args = UpdatePolicyArgs {
            id: 3,
            request_type: None,
            key: None,
            value: Some("750".to_string()),
            grade: Some(" ".to_string()),
            violation_action: None,
            activate: false,
            deactivate: true,
        };

        let patched = args.apply(draft());

        assert_eq!(patched.policy_key, "max_amount");
        assert_eq!(patched.value, "750");
        assert_eq!(patched.policy_grade, None);
        assert_eq!(patched.violation_action, ViolationAction::NeedsReview);
        assert!(!patched.is_active);
    }
}
