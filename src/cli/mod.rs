pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::app;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "learner")]
#[command(about = "Learner CLI - query learner summaries through the SSH tunnel")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show the full progress summary for one learner")]
    Summary {
        #[arg(help = "Learner (mdl_user) id")]
        user_id: i64,
    },

    #[command(about = "List the most recently registered learners")]
    Recent {
        #[arg(long, help = "Number of learners to list (1-100, default 10)")]
        limit: Option<u32>,
    },

    #[command(about = "Check the database answers through the tunnel")]
    Ping,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env()?;
    let (state, manager) = app::build_state(&config);
    let service = &state.summaries;

    let result = match cli.command {
        Commands::Summary { user_id } => {
            commands::summary::handle(service, user_id, output_format).await
        }
        Commands::Recent { limit } => {
            commands::recent::handle(service, limit, output_format).await
        }
        Commands::Ping => commands::ping::handle(service, output_format).await,
    };

    manager.release().await;
    result
}
