//! qaloop CLI - curriculum quality loop.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::GlobalOptions;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "qaloop=debug" } else { "qaloop=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Ctrl-C stops new collaborator calls; calls in flight finish or time out.
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, finishing calls in flight");
        handler_token.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let options = GlobalOptions::from(&cli);
    let result = match cli.command {
        Commands::Cycle {
            unit,
            no_refine,
            json,
            output,
        } => commands::cycle::run(&options, unit, no_refine, json, output, cancel).await,

        Commands::Batch {
            units,
            range,
            concurrency,
            import_passed,
            json,
            output,
        } => {
            commands::batch::run(
                &options,
                units,
                range,
                concurrency,
                import_passed,
                json,
                output,
                cancel,
            )
            .await
        }

        Commands::Report { file } => commands::report::run(file, options.verbose),

        Commands::Status { json } => commands::status::run(&options, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
