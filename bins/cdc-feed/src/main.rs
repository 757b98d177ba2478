mod cmd;

use clap::Parser;

use cdc_api::Classify;
use cmd::Mode;
use cmd::config::{Effective, FeedArgs};

#[derive(Parser)]
#[command(name = "cdc-feed", about = "Журнал событий и change feed поверх CockroachDB")]
struct Cli {
    #[command(flatten)]
    args: FeedArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let Some(mode) = Mode::parse(cli.args.mode.as_deref()) else {
        eprintln!("usage: cdc-feed {}", Mode::USAGE);
        return;
    };

    let eff = match Effective::new(&cli.args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cmd::run(mode, &eff).await {
        tracing::error!(%mode, kind = %e.kind(), error = %e, "failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    tracing::info!(%mode, "done");
}
