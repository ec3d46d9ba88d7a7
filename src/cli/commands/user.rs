use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use serde_json::json;

use crate::access::Role;
use crate::cli::{utils, OutputFormat};
use crate::database::DatabaseManager;
use crate::services::user_service::CreateUser;
use crate::services::UserService;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Admin,
    Lawyer,
    Staff,
    Client,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Role::Admin,
            RoleArg::Lawyer => Role::Lawyer,
            RoleArg::Staff => Role::Staff,
            RoleArg::Client => Role::Client,
        }
    }
}

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create an account directly in the database (bootstraps the first admin)")]
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long, env = "LEXCASE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            name,
            email,
            role,
            password,
            phone,
        } => {
            let password = password.context("a password is required (--password or LEXCASE_PASSWORD)")?;
            let pool = DatabaseManager::pool().await?;

            let user = UserService::new(pool)
                .insert(CreateUser {
                    name,
                    email,
                    password,
                    role: role.into(),
                    phone,
                })
                .await?;

            DatabaseManager::close().await;
            utils::output_success(
                &output_format,
                &format!("Created {} account {} ({})", user.role, user.email, user.id),
                Some(json!({ "user": user })),
            )
        }
    }
}
