use bdui::{loader, scaffold, World};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

const SKIP_INSTALL_ENV: &str = "BDUI_SKIP_BROWSER_INSTALL";

#[derive(Parser)]
#[command(name = "bdui", about = "Behavior-driven UI test orchestration", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold a starter configuration plus features/ and bdui/steps/
    Init {
        #[arg(short, long, default_value = "bdui.config.json")]
        config: PathBuf,
    },
    /// Prepare the browser binary required by the configured backend
    Install,
    /// Bootstrap loaders, load the configuration and smoke-check a world
    Run {
        #[arg(short, long, default_value = "bdui.config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init { config } => {
            let report = scaffold::init(&config).await?;
            info!(
                created = report.created.len(),
                skipped = report.skipped.len(),
                "scaffolding complete"
            );
        }
        Command::Install => {
            if std::env::var_os(SKIP_INSTALL_ENV).is_some() {
                info!("{} is set, skipping browser installation", SKIP_INSTALL_ENV);
                return Ok(());
            }
            // The chrome backend resolves a system browser at launch; the
            // webdriver backend talks to an already-running remote end.
            info!("no managed download required; ensure a chrome binary is on PATH or a WebDriver server is reachable");
        }
        Command::Run { config } => {
            loader::register_loaders()?;
            let config = loader::load_config(&config)?;
            info!(base_url = %config.base_url, "configuration loaded");

            let mut world = World::for_config(&config).await?;
            let result = world.driver().goto(&config.base_url).await;
            // Teardown runs on the failure path too, without masking it.
            world.dispose_quietly().await;
            result?;
            info!("driver round-trip succeeded");
        }
    }
    Ok(())
}
