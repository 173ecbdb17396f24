use approvly_core::config::LoadOptions;
use approvly_core::domain::user::{LoginRequest, RegisterRequest, UserGrade, UserRole};
use clap::Args;

use crate::commands::{execute, CommandResult, Reply};

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: String,
    #[arg(long = "confirm-password")]
    pub confirm_password: String,
    #[arg(long, help = "ADMIN, MANAGER or USER")]
    pub role: Option<UserRole>,
    #[arg(long, help = "GRADE1, GRADE2, GRADE3 or NA")]
    pub grade: Option<UserGrade>,
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub password: String,
}

pub fn register(options: LoadOptions, args: RegisterArgs) -> CommandResult {
    execute("register", options, |context| async move {
        let request = RegisterRequest {
            username: args.username,
            email: args.email.filter(|email| !email.trim().is_empty()),
            password: args.password,
            role: args.role,
            grade: args.grade,
        };
        let response = context.auth().register(&request, &args.confirm_password).await?;
        let message = if response.message.is_empty() {
            format!("registered `{}`", response.user.username)
        } else {
            response.message.clone()
        };
        Ok(Reply::new(message).with_data(&response.user))
    })
}

pub fn login(options: LoadOptions, args: LoginArgs) -> CommandResult {
    execute("login", options, |context| async move {
        let request = LoginRequest { username: args.username, password: args.password };
        let user = context.auth().login(&request).await?;
        Ok(Reply::new(format!("logged in as `{}` ({})", user.username, user.role.as_str()))
            .with_data(&user))
    })
}

pub fn logout(options: LoadOptions) -> CommandResult {
    execute("logout", options, |context| async move {
        let was_authenticated = context.client().session().is_authenticated();
        context.auth().logout().await;
        let message =
            if was_authenticated { "logged out" } else { "no active session; nothing to do" };
        Ok(Reply::new(message))
    })
}

pub fn whoami(options: LoadOptions) -> CommandResult {
    execute("whoami", options, |context| async move {
        let user = context.viewer().await?;
        Ok(Reply::new(format!(
            "`{}` ({}, {})",
            user.username,
            user.role.as_str(),
            user.grade.as_str()
        ))
        .with_data(&user))
    })
}
