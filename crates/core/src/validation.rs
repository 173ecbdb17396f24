use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::analytics::AnalyticsFilter;
use crate::domain::policy::PolicyDraft;
use crate::domain::request::{DiscountDetails, ExpenseDetails, LeaveDetails, RequestDetails};
use crate::domain::user::{LoginRequest, RegisterRequest};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level failures, in the order the checks ran.
#[derive(Clone, Debug, Default, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError { field: field.to_string(), message: message.into() });
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors.iter().find(|error| error.field == field).map(|error| error.message.as_str())
    }

    pub fn by_field(&self) -> BTreeMap<String, Vec<String>> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            fields.entry(error.field.clone()).or_default().push(error.message.clone());
        }
        fields
    }

    pub fn summary(&self) -> String {
        summarize(&self.errors)
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn validate_details(details: &RequestDetails) -> Result<(), ValidationErrors> {
    match details {
        RequestDetails::Leave(leave) => validate_leave(leave),
        RequestDetails::Expense(expense) => validate_expense(expense),
        RequestDetails::Discount(discount) => validate_discount(discount),
    }
}

pub fn validate_leave(details: &LeaveDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if details.reason.trim().is_empty() {
        errors.push("reason", "Reason is required");
    }
    if details.from_date > details.to_date {
        errors.push("to_date", "End date must be after or equal to start date");
    }
    errors.into_result()
}

pub fn validate_expense(details: &ExpenseDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if details.amount <= Decimal::ZERO {
        errors.push("amount", "Amount must be greater than 0");
    }
    errors.into_result()
}

pub fn validate_discount(details: &DiscountDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if details.discount_percentage <= Decimal::ZERO {
        errors.push("discount_percentage", "Discount must be greater than 0");
    } else if details.discount_percentage > Decimal::ONE_HUNDRED {
        errors.push("discount_percentage", "Discount cannot exceed 100%");
    }
    errors.into_result()
}

pub fn validate_login(request: &LoginRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if request.username.trim().is_empty() {
        errors.push("username", "Username is required");
    }
    if request.password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.into_result()
}

pub fn validate_registration(
    request: &RegisterRequest,
    confirm_password: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if request.username.trim().is_empty() {
        errors.push("username", "Username is required");
    }
    if let Some(email) = request.email.as_deref() {
        if !looks_like_email(email) {
            errors.push("email", "Invalid email address");
        }
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("password", format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
    }
    if request.password != confirm_password {
        errors.push("confirm_password", "Passwords do not match");
    }
    errors.into_result()
}

pub fn validate_policy(draft: &PolicyDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if draft.policy_key.trim().is_empty() {
        errors.push("policy_key", "Policy key is required");
    }
    if draft.value.trim().is_empty() {
        errors.push("value", "Value is required");
    }
    errors.into_result()
}

pub fn validate_analytics_filter(filter: &AnalyticsFilter) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(month) = filter.month {
        if !(1..=12).contains(&month) {
            errors.push("month", "Month must be between 1 and 12");
        }
    }
    errors.into_result()
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
