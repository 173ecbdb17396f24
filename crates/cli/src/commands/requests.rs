use approvly_client::{RequestDetailSurface, RequestFilter};
use approvly_core::config::LoadOptions;
use approvly_core::domain::request::{
    ApprovalRequest, DecisionAction, DiscountCategory, DiscountDetails, ExpenseCategory,
    ExpenseDetails, LeaveDetails, LeaveType, RequestDetails, RequestId, RequestKind,
    RequestStatus,
};
use approvly_core::errors::ApiError;
use approvly_core::lifecycle::Actor;
use approvly_core::view::{Filter, RequestControls, RequestFilterSet, StatusCounts};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{execute, CommandResult, Context, Reply};

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Subcommand)]
pub enum RequestsCommand {
    #[command(about = "List requests visible to the current user, newest first")]
    List(ListArgs),
    #[command(about = "Show one request and the controls available on it")]
    Show { id: i64 },
    #[command(about = "Submit a leave request")]
    NewLeave(LeaveArgs),
    #[command(about = "Submit an expense request")]
    NewExpense(ExpenseArgs),
    #[command(about = "Submit a discount request")]
    NewDiscount(DiscountArgs),
    #[command(about = "Replace the details of a pending leave request")]
    UpdateLeave {
        id: i64,
        #[command(flatten)]
        details: LeaveArgs,
    },
    #[command(about = "Replace the details of a pending expense request")]
    UpdateExpense {
        id: i64,
        #[command(flatten)]
        details: ExpenseArgs,
    },
    #[command(about = "Replace the details of a pending discount request")]
    UpdateDiscount {
        id: i64,
        #[command(flatten)]
        details: DiscountArgs,
    },
    #[command(about = "Delete one of your own pending requests")]
    Delete { id: i64 },
    #[command(about = "Record a decision (APPROVED, REJECTED or NEEDS_REVIEW)")]
    Act(ActArgs),
    #[command(about = "Flag a request for attention")]
    Flag { id: i64 },
    #[command(about = "Clear the flag on a request")]
    Unflag { id: i64 },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    #[arg(long, help = "Only requests submitted by the current user")]
    pub mine: bool,
    #[arg(long)]
    pub status: Option<RequestStatus>,
    #[arg(long, help = "LEAVE, EXPENSE or DISCOUNT (filtered locally)")]
    pub kind: Option<RequestKind>,
}

#[derive(Debug, Clone, Args)]
pub struct LeaveArgs {
    #[arg(long = "leave-type", default_value = "PAID")]
    pub leave_type: LeaveType,
    #[arg(long = "from", help = "First day of leave (YYYY-MM-DD)")]
    pub from_date: NaiveDate,
    #[arg(long = "to", help = "Last day of leave (YYYY-MM-DD)")]
    pub to_date: NaiveDate,
    #[arg(long)]
    pub reason: String,
}

#[derive(Debug, Clone, Args)]
pub struct ExpenseArgs {
    #[arg(long)]
    pub amount: Decimal,
    #[arg(long, default_value = "OTHER")]
    pub category: ExpenseCategory,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DiscountArgs {
    #[arg(long)]
    pub percentage: Decimal,
    #[arg(long)]
    pub category: Option<DiscountCategory>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ActArgs {
    pub id: i64,
    #[arg(long)]
    pub action: DecisionAction,
    #[arg(long)]
    pub reason: Option<String>,
    #[arg(long, help = "Send the decision even when it is not offered")]
    pub force: bool,
}

impl From<LeaveArgs> for RequestDetails {
    fn from(args: LeaveArgs) -> Self {
        Self::Leave(LeaveDetails {
            leave_type: args.leave_type,
            from_date: args.from_date,
            to_date: args.to_date,
            reason: args.reason,
        })
    }
}

impl From<ExpenseArgs> for RequestDetails {
    fn from(args: ExpenseArgs) -> Self {
        Self::Expense(ExpenseDetails {
            amount: args.amount,
            category: args.category,
            description: non_blank(args.description),
        })
    }
}

impl From<DiscountArgs> for RequestDetails {
    fn from(args: DiscountArgs) -> Self {
        Self::Discount(DiscountDetails {
            discount_percentage: args.percentage,
            discount_category: args.category,
            description: non_blank(args.description),
        })
    }
}

#[derive(Debug, Serialize)]
struct RequestView {
    request: ApprovalRequest,
    controls: RequestControls,
}

#[derive(Debug, Serialize)]
struct Dashboard {
    counts: StatusCounts,
    recent: Vec<ApprovalRequest>,
}

pub fn run(options: LoadOptions, command: RequestsCommand) -> CommandResult {
    match command {
        RequestsCommand::List(args) => list(options, args),
        RequestsCommand::Show { id } => show(options, RequestId(id)),
        RequestsCommand::NewLeave(args) => create(options, "requests.new-leave", args.into()),
        RequestsCommand::NewExpense(args) => create(options, "requests.new-expense", args.into()),
        RequestsCommand::NewDiscount(args) => {
            create(options, "requests.new-discount", args.into())
        }
        RequestsCommand::UpdateLeave { id, details } => {
            update(options, "requests.update-leave", RequestId(id), details.into())
        }
        RequestsCommand::UpdateExpense { id, details } => {
            update(options, "requests.update-expense", RequestId(id), details.into())
        }
        RequestsCommand::UpdateDiscount { id, details } => {
            update(options, "requests.update-discount", RequestId(id), details.into())
        }
        RequestsCommand::Delete { id } => delete(options, RequestId(id)),
        RequestsCommand::Act(args) => act(options, args),
        RequestsCommand::Flag { id } => set_flag(options, "requests.flag", RequestId(id), true),
        RequestsCommand::Unflag { id } => {
            set_flag(options, "requests.unflag", RequestId(id), false)
        }
    }
}

fn list(options: LoadOptions, args: ListArgs) -> CommandResult {
    execute("requests.list", options, |context| async move {
        let mut filter = if args.mine { RequestFilter::mine() } else { RequestFilter::default() };
        if let Some(status) = args.status {
            filter = filter.with_status(status);
        }
        let requests = context.requests().list(&filter).await?;
        let requests = RequestFilterSet::new(Filter::All, args.kind.into()).apply(&requests);
        Ok(Reply::new(format!("{} request(s)", requests.len())).with_data(&requests))
    })
}

fn show(options: LoadOptions, id: RequestId) -> CommandResult {
    execute("requests.show", options, |context| async move {
        let surface = load_surface(&context, id).await?;
        let view = RequestView { request: surface.request(), controls: surface.controls() };
        Ok(Reply::new(describe(&view.request)).with_data(&view))
    })
}

fn create(options: LoadOptions, command: &str, details: RequestDetails) -> CommandResult {
    execute(command, options, |context| async move {
        let created = context.requests().create(&details).await?;
        Ok(Reply::new(format!("submitted {}", describe(&created))).with_data(&created))
    })
}

fn update(
    options: LoadOptions,
    command: &str,
    id: RequestId,
    details: RequestDetails,
) -> CommandResult {
    execute(command, options, |context| async move {
        let surface = load_surface(&context, id).await?;
        let updated = surface.update(&details).await?;
        Ok(Reply::new(format!("updated {}", describe(&updated))).with_data(&updated))
    })
}

fn delete(options: LoadOptions, id: RequestId) -> CommandResult {
    execute("requests.delete", options, |context| async move {
        let surface = load_surface(&context, id).await?;
        surface.delete().await?;
        Ok(Reply::new(format!("deleted request {id}")))
    })
}

fn act(options: LoadOptions, args: ActArgs) -> CommandResult {
    execute("requests.act", options, |context| async move {
        let surface = load_surface(&context, RequestId(args.id)).await?;
        let decided = if args.force {
            surface.force_decide(args.action, args.reason).await?
        } else {
            surface.decide(args.action, args.reason).await?
        };
        Ok(Reply::new(describe(&decided)).with_data(&decided))
    })
}

fn set_flag(options: LoadOptions, command: &str, id: RequestId, is_flagged: bool) -> CommandResult {
    execute(command, options, |context| async move {
        let surface = load_surface(&context, id).await?;
        let updated = surface.set_flag(is_flagged).await?;
        let verb = if updated.is_flagged { "flagged" } else { "unflagged" };
        Ok(Reply::new(format!("{verb} request {id}")).with_data(&updated))
    })
}

/// Status counts and the most recent of the current user's own requests.
pub fn dashboard(options: LoadOptions) -> CommandResult {
    execute("dashboard", options, |context| async move {
        let requests = context.requests().list(&RequestFilter::mine()).await?;
        let counts = StatusCounts::from_requests(&requests);
        let recent = requests.into_iter().take(RECENT_LIMIT).collect();
        let message = format!(
            "{} total: {} pending, {} approved, {} rejected, {} needs review",
            counts.total, counts.pending, counts.approved, counts.rejected, counts.needs_review
        );
        Ok(Reply::new(message).with_data(&Dashboard { counts, recent }))
    })
}

async fn load_surface(context: &Context, id: RequestId) -> Result<RequestDetailSurface, ApiError> {
    let viewer = context.viewer().await?;
    RequestDetailSurface::load(context.requests(), Actor::from(&viewer), id).await
}

fn describe(request: &ApprovalRequest) -> String {
    let flag = if request.is_flagged { ", flagged" } else { "" };
    format!("{} request {} is {}{flag}", request.kind(), request.id, request.status)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
