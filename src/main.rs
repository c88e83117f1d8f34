use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dbtstatus",
    about = "Traffic-light status page generator for scheduled dbt Cloud jobs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll dbt Cloud and write the JSON snapshot + HTML dashboard
    Generate {
        /// Output directory for status.json and index.html
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,

        /// Optional TOML config file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Poll dbt Cloud and print the snapshot without writing files
    Status {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Optional TOML config file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate configuration and print the resolved job list
    CheckConfig {
        /// Optional TOML config file (environment variables take precedence)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { out_dir, config } => {
            let config = dbtstatus::config::Config::load(config.as_deref())?;
            tracing::info!(jobs = config.jobs.len(), out_dir = %out_dir.display(), "Generating status page");
            let snap = dbtstatus::generate(&config, &out_dir).await?;
            println!("{} -- overall {}", snap.summary(), snap.overall);
        }
        Commands::Status { json, config } => {
            let config = dbtstatus::config::Config::load(config.as_deref())?;
            let snap = dbtstatus::poll(&config).await?;
            if json {
                let json_output = serde_json::to_string_pretty(&snap)?;
                println!("{}", json_output);
            } else {
                println!("\ndbt Cloud Job Status -- {}", snap.summary());
                println!(
                    "{:<30} | {:<6} | {:<45} | {:<5} | Freshness",
                    "Job", "Color", "Reason", "Tests"
                );
                println!(
                    "{:-<30}-|-{:-<6}-|-{:-<45}-|-{:-<5}-|-{:-<25}",
                    "", "", "", "", ""
                );
                for job in &snap.jobs {
                    let tests = job
                        .failed_tests
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<30} | {:<6} | {:<45} | {:<5} | {}",
                        job.job_name, job.color, job.reason, tests, job.freshness_display
                    );
                }
                println!();
            }
        }
        Commands::CheckConfig { config } => {
            let config = dbtstatus::config::Config::load(config.as_deref())?;
            println!("Account:        {}", config.account);
            println!("API base:       {}", config.api_base);
            println!("Dashboard base: {}", config.dashboard_base);
            println!();
            println!("{:<14} | Name", "Job ID");
            println!("{:-<14}-|-{:-<30}", "", "");
            for job in &config.jobs {
                println!("{:<14} | {}", job.id, job.name.as_deref().unwrap_or("-"));
            }
        }
    }

    Ok(())
}
