//! Metrics report sinks.
//!
//! The calculator drives a sink through a fixed event sequence:
//!
//! ```text
//! start_report
//! ( enter_context
//!   ( no_replication_data
//!   | ( last_successful queue_length oldest_pending )* ) )*
//! finish
//! ```
//!
//! A sink keeps only what it needs to write the current line or row, and
//! nothing across contexts.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{Duration, SecondsFormat};
use replcheck_core::{ChangeId, QueueLength};

use crate::calculator::{ChangeAge, RunSummary};
use crate::error::Result;

/// Destination for metrics events.
pub trait ReportSink {
    fn start_report(&mut self) -> Result<()>;

    fn enter_context(&mut self, context: &str) -> Result<()>;

    /// The context has no change table or an empty one.
    fn no_replication_data(&mut self) -> Result<()>;

    fn last_successful(&mut self, consumer: &str, change: &ChangeAge) -> Result<()>;

    fn queue_length(
        &mut self,
        consumer: &str,
        last_change_id: ChangeId,
        queue: QueueLength,
    ) -> Result<()>;

    /// Last event for a consumer.
    fn oldest_pending(&mut self, consumer: &str, change: &ChangeAge) -> Result<()>;

    fn finish(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Render an age as hours, minutes and seconds, e.g. `1h2m3.5s`.
pub fn format_age(age: Duration) -> String {
    let mut out = String::new();
    let age = if age < Duration::zero() {
        out.push('-');
        -age
    } else {
        age
    };

    let total = age.num_seconds();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }

    let micros = age.subsec_nanos() / 1_000;
    if micros == 0 {
        let _ = write!(out, "{}s", seconds);
    } else {
        let fraction = format!("{:06}", micros);
        let _ = write!(out, "{}.{}s", seconds, fraction.trim_end_matches('0'));
    }
    out
}

/// Human-readable report, one line per event.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn age_line(&mut self, consumer: &str, which: &str, change: &ChangeAge) -> Result<()> {
        match change {
            ChangeAge::Known(time) => writeln!(
                self.out,
                "  {} {} change's modifyTimestamp age is {}",
                consumer,
                which,
                format_age(time.age)
            )?,
            ChangeAge::Unavailable => writeln!(
                self.out,
                "  {} {} change's modifyTimestamp age is unavailable",
                consumer, which
            )?,
            ChangeAge::NoChange => {}
        }
        Ok(())
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn start_report(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "Reporting last successful change / oldest pending changes for all contexts"
        )?;
        writeln!(
            self.out,
            "--------------------------------------------------------------------------"
        )?;
        Ok(())
    }

    fn enter_context(&mut self, context: &str) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{} replication status:", context)?;
        Ok(())
    }

    fn no_replication_data(&mut self) -> Result<()> {
        writeln!(self.out, "  No replication data found.")?;
        Ok(())
    }

    fn last_successful(&mut self, consumer: &str, change: &ChangeAge) -> Result<()> {
        self.age_line(consumer, "last successful", change)
    }

    fn queue_length(
        &mut self,
        consumer: &str,
        last_change_id: ChangeId,
        queue: QueueLength,
    ) -> Result<()> {
        if queue.is_caught_up() {
            writeln!(
                self.out,
                "  Congratulations! No pending replication entries found for {}",
                consumer
            )?;
        } else {
            writeln!(
                self.out,
                "  {} last successful change ID is {} (queue length {})",
                consumer, last_change_id, queue.pending
            )?;
        }
        Ok(())
    }

    fn oldest_pending(&mut self, consumer: &str, change: &ChangeAge) -> Result<()> {
        self.age_line(consumer, "oldest pending", change)
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Fields of the row being assembled for one consumer.
#[derive(Default)]
struct PendingRow {
    successful: String,
    queue: String,
}

/// CSV rows `context,consumer,successfulTimestamp,pendingTimestamp,queueSize`.
///
/// The legend goes to `notes`. A row is written when its trailing
/// `oldest_pending` event arrives.
pub struct CsvSink<W: Write, N: Write> {
    writer: csv::Writer<W>,
    notes: N,
    context: String,
    row: PendingRow,
}

impl<W: Write, N: Write> CsvSink<W, N> {
    pub fn new(out: W, notes: N) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            notes,
            context: String::new(),
            row: PendingRow::default(),
        }
    }
}

fn csv_timestamp(change: &ChangeAge) -> String {
    match change {
        ChangeAge::Known(time) => time.at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ChangeAge::Unavailable | ChangeAge::NoChange => String::new(),
    }
}

impl<W: Write, N: Write> ReportSink for CsvSink<W, N> {
    fn start_report(&mut self) -> Result<()> {
        let out = &mut self.notes;
        writeln!(out, "Legend for output:")?;
        writeln!(out, "  context - suffix or context present in server (may or may not be replicated).")?;
        writeln!(out, "  consumer - hostname or ip address of server data is being replicated to.")?;
        writeln!(out, "  successfulTimestamp - last successful change that was replicated.")?;
        writeln!(out, "  pendingTimestamp - oldest pending change that needs to be replicated.")?;
        writeln!(out, "  queueSize - number of objects pending in replication queue.")?;
        writeln!(out)?;
        writeln!(out, "Note: Timestamps are provided in UTC timezone.")?;
        writeln!(out)?;
        out.flush()?;

        self.writer.write_record([
            "context",
            "consumer",
            "successfulTimestamp",
            "pendingTimestamp",
            "queueSize",
        ])?;
        Ok(())
    }

    fn enter_context(&mut self, context: &str) -> Result<()> {
        self.context = context.to_string();
        self.row = PendingRow::default();
        Ok(())
    }

    fn no_replication_data(&mut self) -> Result<()> {
        self.writer
            .write_record([self.context.as_str(), "", "", "", ""])?;
        Ok(())
    }

    fn last_successful(&mut self, _consumer: &str, change: &ChangeAge) -> Result<()> {
        self.row.successful = csv_timestamp(change);
        Ok(())
    }

    fn queue_length(
        &mut self,
        _consumer: &str,
        _last_change_id: ChangeId,
        queue: QueueLength,
    ) -> Result<()> {
        self.row.queue = queue.pending.to_string();
        Ok(())
    }

    fn oldest_pending(&mut self, consumer: &str, change: &ChangeAge) -> Result<()> {
        let row = std::mem::take(&mut self.row);
        self.writer.write_record([
            self.context.as_str(),
            consumer,
            row.successful.as_str(),
            csv_timestamp(change).as_str(),
            row.queue.as_str(),
        ])?;
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::ChangeTime;
    use chrono::{TimeZone, Utc};

    fn known(seconds_ago: i64) -> ChangeAge {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let at = now - Duration::seconds(seconds_ago);
        ChangeAge::Known(ChangeTime {
            at,
            age: now - at,
        })
    }

    fn queue(pending: u64) -> QueueLength {
        QueueLength::between(ChangeId(100), ChangeId(100 - pending as i64))
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::zero()), "0s");
        assert_eq!(format_age(Duration::seconds(42)), "42s");
        assert_eq!(format_age(Duration::seconds(3_661)), "1h1m1s");
        assert_eq!(format_age(Duration::seconds(7_200)), "2h0m0s");
        assert_eq!(format_age(Duration::milliseconds(90_500)), "1m30.5s");
        assert_eq!(format_age(Duration::seconds(-5)), "-5s");
    }

    #[test]
    fn test_text_sink_lines() {
        let mut sink = TextSink::new(Vec::new());
        sink.start_report().unwrap();
        sink.enter_context("O=EXAMPLE").unwrap();
        sink.last_successful("replica1", &known(300)).unwrap();
        sink.queue_length("replica1", ChangeId(95), queue(5)).unwrap();
        sink.oldest_pending("replica1", &known(240)).unwrap();
        sink.last_successful("replica2", &ChangeAge::Unavailable).unwrap();
        sink.queue_length("replica2", ChangeId(100), queue(0)).unwrap();
        sink.oldest_pending("replica2", &ChangeAge::NoChange).unwrap();
        sink.enter_context("O=EMPTY").unwrap();
        sink.no_replication_data().unwrap();
        sink.finish(&RunSummary::default()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Reporting last successful change / oldest pending changes for all contexts",
                "--------------------------------------------------------------------------",
                "",
                "O=EXAMPLE replication status:",
                "  replica1 last successful change's modifyTimestamp age is 5m0s",
                "  replica1 last successful change ID is 95 (queue length 5)",
                "  replica1 oldest pending change's modifyTimestamp age is 4m0s",
                "  replica2 last successful change's modifyTimestamp age is unavailable",
                "  Congratulations! No pending replication entries found for replica2",
                "",
                "O=EMPTY replication status:",
                "  No replication data found.",
            ]
        );
    }

    #[test]
    fn test_csv_sink_rows() {
        let mut data = Vec::new();
        let mut notes = Vec::new();
        {
            let mut sink = CsvSink::new(&mut data, &mut notes);
            sink.start_report().unwrap();
            sink.enter_context("O=EXAMPLE").unwrap();
            sink.last_successful("replica1", &known(300)).unwrap();
            sink.queue_length("replica1", ChangeId(95), queue(5)).unwrap();
            sink.oldest_pending("replica1", &known(240)).unwrap();
            sink.last_successful("replica2", &known(60)).unwrap();
            sink.queue_length("replica2", ChangeId(100), queue(0)).unwrap();
            sink.oldest_pending("replica2", &ChangeAge::NoChange).unwrap();
            sink.enter_context("EMPTY").unwrap();
            sink.no_replication_data().unwrap();
            sink.finish(&RunSummary::default()).unwrap();
        }

        let csv = String::from_utf8(data).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "context,consumer,successfulTimestamp,pendingTimestamp,queueSize",
                "O=EXAMPLE,replica1,2024-01-01T11:55:00.000000Z,2024-01-01T11:56:00.000000Z,5",
                "O=EXAMPLE,replica2,2024-01-01T11:59:00.000000Z,,0",
                "EMPTY,,,,",
            ]
        );
        assert!(String::from_utf8(notes)
            .unwrap()
            .starts_with("Legend for output:"));
    }

    #[test]
    fn test_csv_sink_quotes_contexts() {
        let mut data = Vec::new();
        {
            let mut sink = CsvSink::new(&mut data, std::io::sink());
            sink.start_report().unwrap();
            sink.enter_context("O=EXAMPLE,C=US").unwrap();
            sink.no_replication_data().unwrap();
            sink.finish(&RunSummary::default()).unwrap();
        }
        let csv = String::from_utf8(data).unwrap();
        assert!(csv.ends_with("\"O=EXAMPLE,C=US\",,,,\n"));
    }
}
