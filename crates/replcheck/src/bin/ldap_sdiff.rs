//! Compare the entries of two directory server replicas.

use anyhow::Context;
use replcheck::cli::{parse_or_exit, SdiffArgs};
use replcheck::{logging, run_diff};
use tracing::error;

async fn run(args: SdiffArgs) -> anyhow::Result<()> {
    let config = args.into_config()?;
    let run = run_diff(&config)
        .await
        .context("ldap-sdiff failed")?;

    if let Some(reason) = run.aborted {
        eprintln!("ldap-sdiff: comparison incomplete: {}", reason);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: SdiffArgs = parse_or_exit();
    logging::init(args.log_level());

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("ldap-sdiff: {:#}", e);
        std::process::exit(1);
    }
}
