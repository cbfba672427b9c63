//! The `repl-data` run: replication lag for every context of one server.

use std::io;

use chrono::Utc;
use replcheck_metrics::{report_contexts, CsvSink, ReportSink, RunSummary, TextSink};
use tracing::info;

use crate::config::{MetricsConfig, ReportFormat};
use crate::connect::open_backend;
use crate::error::Result;
use crate::output::open_output;

/// Report replication lag for the configured server.
pub async fn run_metrics(config: &MetricsConfig) -> Result<RunSummary> {
    let started = Utc::now();
    let backend = open_backend(&config.endpoint).await?;

    let out = open_output(config.output_file.as_deref())?;
    let mut sink: Box<dyn ReportSink + Send> = match config.format {
        ReportFormat::Text => Box::new(TextSink::new(out)),
        ReportFormat::Csv => Box::new(CsvSink::new(out, io::stderr())),
    };

    let summary = report_contexts(
        backend.as_ref(),
        &config.endpoint.schema,
        config.replica.as_deref(),
        sink.as_mut(),
        started,
    )
    .await?;

    info!(
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "repl-data finished"
    );
    Ok(summary)
}
