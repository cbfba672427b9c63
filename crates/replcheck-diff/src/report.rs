//! Diff report sinks.
//!
//! A sink receives records as the comparison finds them. `start` and
//! `finish` bracket one run and are called by the driver, not by
//! [`compare`](crate::compare).

use std::io::Write;

use chrono::{DateTime, Utc};
use replcheck_core::parse_entry_timestamp;
use tracing::debug;

use crate::compare::{DiffRecord, DiffSummary, Side};
use crate::error::Result;

/// Destination for diff records.
pub trait DiffSink {
    /// Called once before the first record.
    fn start(&mut self, _first: &str, _second: &str) -> Result<()> {
        Ok(())
    }

    fn record(&mut self, record: &DiffRecord) -> Result<()>;

    /// Called once after the last record, also after an aborted comparison.
    fn finish(&mut self, _summary: &DiffSummary) -> Result<()> {
        Ok(())
    }
}

/// Collects records in memory.
impl DiffSink for Vec<DiffRecord> {
    fn record(&mut self, record: &DiffRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// One line per record.
pub struct TextDiffSink<W: Write> {
    out: W,
    hosts: [String; 2],
}

impl<W: Write> TextDiffSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            hosts: [String::new(), String::new()],
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DiffSink for TextDiffSink<W> {
    fn start(&mut self, first: &str, second: &str) -> Result<()> {
        self.hosts = [first.to_string(), second.to_string()];
        writeln!(
            self.out,
            "Reporting dn_trunc and modify_timestamp for any conflicting entries"
        )?;
        writeln!(
            self.out,
            "-------------------------------------------------------------------"
        )?;
        Ok(())
    }

    fn record(&mut self, record: &DiffRecord) -> Result<()> {
        match record {
            DiffRecord::Mismatch {
                key,
                first_timestamp,
                second_timestamp,
            } => writeln!(
                self.out,
                "Mismatching timestamps for {}: {} != {}",
                key, first_timestamp, second_timestamp
            )?,
            DiffRecord::Missing {
                key, missing_on, ..
            } => writeln!(self.out, "Missing entry on {} server: {}", missing_on, key)?,
        }
        Ok(())
    }

    fn finish(&mut self, summary: &DiffSummary) -> Result<()> {
        for (host, side) in self.hosts.iter().zip([Side::First, Side::Second]) {
            writeln!(self.out, "Total entries on {}: {}", host, summary.entries(side))?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// CSV rows `dn,modifyTimestamp1,modifyTimestamp2,status`.
///
/// The legend and totals go to `notes`, so the data output stays plain CSV.
pub struct CsvDiffSink<W: Write, N: Write> {
    writer: csv::Writer<W>,
    notes: N,
    started_at: DateTime<Utc>,
    hosts: [String; 2],
}

/// Status codes of the CSV report.
mod status {
    pub const MISMATCH: &str = "1";
    pub const ONLY_ON_FIRST: &str = "2";
    pub const ONLY_ON_SECOND: &str = "3";
    /// Appended once per timestamp newer than the run start.
    pub const IN_FLIGHT: char = '*';
}

impl<W: Write, N: Write> CsvDiffSink<W, N> {
    /// `started_at` is the run start; later timestamps are flagged as in flight.
    pub fn new(out: W, notes: N, started_at: DateTime<Utc>) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            notes,
            started_at,
            hosts: [String::new(), String::new()],
        }
    }

    fn in_flight(&self, timestamp: &str) -> bool {
        match parse_entry_timestamp(timestamp) {
            Ok(at) => at > self.started_at,
            Err(e) => {
                debug!(error = %e, "cannot check timestamp for in-flight change");
                false
            }
        }
    }

    fn status(&self, code: &str, timestamps: &[&str]) -> String {
        let mut flagged = code.to_string();
        for ts in timestamps {
            if self.in_flight(ts) {
                flagged.push(status::IN_FLIGHT);
            }
        }
        flagged
    }

    fn write_legend(&mut self) -> Result<()> {
        let [first, second] = &self.hosts;
        let out = &mut self.notes;
        writeln!(out, "Legend for output:")?;
        writeln!(out, "  dn - distinguished name of the object that is out of sync or missing.")?;
        writeln!(out, "  modifyTimestamp1 - dn's object last modified on server: {}.", first)?;
        writeln!(out, "  modifyTimestamp2 - dn's object last modified on server: {}.", second)?;
        writeln!(out, "  status - the following are what the values mean:")?;
        writeln!(out, "    1: Object detected in both servers but modify timestamps are different indicating mis-match.")?;
        writeln!(out, "    2: Object found in {} but missing in {}.", first, second)?;
        writeln!(out, "    3: Object found in {} but missing in {}.", second, first)?;
        writeln!(out, "    *: Detecting Modify Timestamp more recent than when this run started,")?;
        writeln!(out, "       further comparison of object recommended (replication may fix mis-match).")?;
        writeln!(out)?;
        writeln!(out, "Note: Timestamps are provided in UTC timezone.")?;
        writeln!(out)?;
        Ok(())
    }
}

impl<W: Write, N: Write> DiffSink for CsvDiffSink<W, N> {
    fn start(&mut self, first: &str, second: &str) -> Result<()> {
        self.hosts = [first.to_string(), second.to_string()];
        self.write_legend()?;
        self.notes.flush()?;
        self.writer
            .write_record(["dn", "modifyTimestamp1", "modifyTimestamp2", "status"])?;
        Ok(())
    }

    fn record(&mut self, record: &DiffRecord) -> Result<()> {
        let row = match record {
            DiffRecord::Mismatch {
                key,
                first_timestamp,
                second_timestamp,
            } => [
                key.clone(),
                first_timestamp.clone(),
                second_timestamp.clone(),
                self.status(
                    status::MISMATCH,
                    &[first_timestamp.as_str(), second_timestamp.as_str()],
                ),
            ],
            DiffRecord::Missing {
                key,
                timestamp,
                missing_on: Side::Second,
            } => [
                key.clone(),
                timestamp.clone(),
                String::new(),
                self.status(status::ONLY_ON_FIRST, &[timestamp.as_str()]),
            ],
            DiffRecord::Missing {
                key,
                timestamp,
                missing_on: Side::First,
            } => [
                key.clone(),
                String::new(),
                timestamp.clone(),
                self.status(status::ONLY_ON_SECOND, &[timestamp.as_str()]),
            ],
        };
        self.writer.write_record(&row)?;
        Ok(())
    }

    fn finish(&mut self, summary: &DiffSummary) -> Result<()> {
        self.writer.flush()?;
        for (host, side) in self.hosts.iter().zip([Side::First, Side::Second]) {
            writeln!(self.notes, "Total entries on {}: {}", host, summary.entries(side))?;
        }
        self.notes.flush()?;
        Ok(())
    }
}
