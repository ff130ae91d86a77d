mod cli;
mod commands;
mod config;
mod prelude;
mod storage;

use anyhow::Result;
use clap::Parser;
use dynarec_core::access::TableAccess;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::prelude::*;
use crate::storage::dynamodb::{create_client, DynamoDbStore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynarec=info,dynarec_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(cli).await {
        aeprintln!("{} {:#}", p_r("error:"), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(endpoint_url) = cli.endpoint_url {
        config.endpoint_url = Some(endpoint_url);
    }
    if let Some(region) = cli.region {
        config.region = region;
    }
    tracing::debug!(target_env = %config.target_display(), "Using configuration");

    let client = create_client(&config).await;
    let access =
        TableAccess::new(DynamoDbStore::new(client)).with_retry_policy(config.retry_policy());

    let (label, output) = match cli.command {
        Commands::Query(args) => ("query", commands::query(&access, args, config.page_size).await?),
        Commands::Get(args) => ("get", commands::get(&access, args).await?),
        Commands::Upsert(args) => ("upsert", commands::upsert(&access, args).await?),
        Commands::Delete(args) => ("delete", commands::delete(&access, args).await?),
        Commands::Write(args) => ("write", commands::write(&access, args).await?),
    };

    aprintln!("{}", serde_json::to_string_pretty(&output)?);

    let failed = output.get("success") == Some(&serde_json::Value::Bool(false));
    if failed {
        aeprintln!("{} {} finished with failures", p_y("warning:"), p_c(label));
        std::process::exit(2);
    }
    aeprintln!("{} {} against {}", p_g("done:"), p_c(label), config.target_display());

    Ok(())
}
