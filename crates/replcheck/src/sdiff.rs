//! The `ldap-sdiff` run: stream both replicas and merge them into a report.

use std::io;

use chrono::Utc;
use replcheck_diff::{compare, CsvDiffSink, DiffError, DiffSink, DiffSummary, TextDiffSink};
use tracing::{error, info};

use crate::config::{DiffConfig, ReportFormat};
use crate::connect::open_backend;
use crate::error::Result;
use crate::output::open_output;

/// Result of one diff run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRun {
    pub summary: DiffSummary,
    /// Set when a stream failed and the report is partial.
    pub aborted: Option<String>,
}

/// Compare the two configured replicas and write the report.
///
/// Connection and output failures are errors. A failure while streaming
/// entries is logged, the partial report is finished, and the run is
/// returned with `aborted` set.
pub async fn run_diff(config: &DiffConfig) -> Result<DiffRun> {
    let started = Utc::now();
    let (first, second) =
        tokio::try_join!(open_backend(&config.first), open_backend(&config.second))?;

    let out = open_output(config.output_file.as_deref())?;
    let mut sink: Box<dyn DiffSink + Send> = match config.format {
        ReportFormat::Text => Box::new(TextDiffSink::new(out)),
        ReportFormat::Csv => Box::new(CsvDiffSink::new(out, io::stderr(), started)),
    };

    sink.start(&first.describe(), &second.describe())?;

    let mut first_entries = first.stream_entries(&config.first.schema);
    let mut second_entries = second.stream_entries(&config.second.schema);

    let (summary, aborted) =
        match compare(&mut first_entries, &mut second_entries, sink.as_mut()).await {
            Ok(summary) => (summary, None),
            Err(DiffError::Stream {
                side,
                source,
                summary,
            }) => {
                error!(%side, error = %source, "comparison aborted, report is partial");
                (summary, Some(format!("{} server: {}", side, source)))
            }
            Err(e) => return Err(e.into()),
        };

    sink.finish(&summary)?;
    info!(
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        differences = summary.differences(),
        "ldap-sdiff finished"
    );
    Ok(DiffRun { summary, aborted })
}
