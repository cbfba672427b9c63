//! Report replication lag per context and consumer.

use anyhow::Context;
use replcheck::cli::{parse_or_exit, ReplDataArgs};
use replcheck::{logging, run_metrics};
use tracing::error;

async fn run(args: ReplDataArgs) -> anyhow::Result<()> {
    let config = args.into_config()?;
    let summary = run_metrics(&config)
        .await
        .context("repl-data failed")?;

    if summary.failed > 0 {
        eprintln!(
            "repl-data: {} of {} contexts could not be read",
            summary.failed, summary.contexts
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: ReplDataArgs = parse_or_exit();
    logging::init(args.loglevel);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("repl-data: {:#}", e);
        std::process::exit(1);
    }
}
