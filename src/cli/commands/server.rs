use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use serde_json::Value;

use crate::cli::{utils, OutputFormat};

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from the /health endpoint")]
    Health {
        #[arg(long, env = "LEXCASE_URL", default_value = "http://localhost:4000")]
        url: String,
    },

    #[command(about = "Show server information from the API root endpoint")]
    Info {
        #[arg(long, env = "LEXCASE_URL", default_value = "http://localhost:4000")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health { url } => {
            let (status, body) = fetch(&url, "/health").await?;
            utils::output_fields(&output_format, &body["data"])?;
            if !status.is_success() {
                anyhow::bail!("server at {} is unhealthy ({})", url, status);
            }
            Ok(())
        }
        ServerCommands::Info { url } => {
            let (_, body) = fetch(&url, "/").await?;
            utils::output_fields(&output_format, &body["data"])
        }
    }
}

async fn fetch(base: &str, path: &str) -> anyhow::Result<(reqwest::StatusCode, Value)> {
    let url = format!("{}{}", base.trim_end_matches('/'), path);
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .with_context(|| format!("could not reach {}", url))?;
    let status = response.status();
    let body = response.json::<Value>().await.context("server returned a non-JSON body")?;
    Ok((status, body))
}
