//! Replication lag calculation.
//!
//! Contexts are processed one after another and each is fully written to
//! the sink before the next begins. A store error inside one context ends
//! that context only; an undecodable control affects one consumer only.

use chrono::{DateTime, Duration, Utc};
use replcheck_core::{
    decode_control_timestamp, parse_generalized_time, ChangeId, ChangeOffset, QueueLength,
    ReplicationConsumer, ReplicationContext, Schema,
};
use replcheck_store::{changes, Backend, TableLookup};
use tracing::{debug, error, info, warn};

use crate::error::{MetricsError, Result};
use crate::sink::ReportSink;

/// When a change was made and how long ago that is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeTime {
    pub at: DateTime<Utc>,
    /// Run start minus `at`. Negative if the server clock is ahead.
    pub age: Duration,
}

/// What is known about one change of a consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeAge {
    Known(ChangeTime),
    /// The change exists but its control could not be decoded.
    Unavailable,
    /// There is no such change; used for the oldest pending change of a
    /// caught-up consumer.
    NoChange,
}

/// How one context was reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextOutcome {
    /// No change table, or an empty one.
    NoReplicationData,
    Reported {
        consumers: u64,
        decode_failures: u64,
    },
    /// A store error ended the context early.
    Failed,
}

/// Counters for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub contexts: u64,
    pub without_data: u64,
    pub failed: u64,
    pub consumers: u64,
    /// Controls whose timestamp could not be recovered.
    pub decode_failures: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: ContextOutcome) {
        self.contexts += 1;
        match outcome {
            ContextOutcome::NoReplicationData => self.without_data += 1,
            ContextOutcome::Reported {
                consumers,
                decode_failures,
            } => {
                self.consumers += consumers;
                self.decode_failures += decode_failures;
            }
            ContextOutcome::Failed => self.failed += 1,
        }
    }
}

/// Recover the `modifyTimestamp` of a change from its control column.
fn change_age(consumer: &str, control: &str, now: DateTime<Utc>) -> ChangeAge {
    let timestamp = match decode_control_timestamp(control) {
        Ok(Some(timestamp)) => timestamp,
        Ok(None) => {
            warn!(%consumer, "replication control has no modifyTimestamp");
            return ChangeAge::Unavailable;
        }
        Err(e) => {
            warn!(%consumer, error = %e, "cannot decode replication control");
            return ChangeAge::Unavailable;
        }
    };

    match parse_generalized_time(&timestamp) {
        Ok(at) => ChangeAge::Known(ChangeTime { at, age: now - at }),
        Err(e) => {
            warn!(%consumer, error = %e, "cannot parse modifyTimestamp");
            ChangeAge::Unavailable
        }
    }
}

fn no_data<S: ReportSink + ?Sized>(
    sink: &mut S,
    context: &ReplicationContext,
) -> Result<ContextOutcome> {
    info!(
        context = %context.dn,
        "no replication data found, perhaps no replication is set up"
    );
    sink.no_replication_data()?;
    Ok(ContextOutcome::NoReplicationData)
}

async fn report_context<B, S>(
    backend: &B,
    schema: &Schema,
    context: &ReplicationContext,
    replica: Option<&str>,
    sink: &mut S,
    now: DateTime<Utc>,
) -> Result<ContextOutcome>
where
    B: Backend + ?Sized,
    S: ReportSink + ?Sized,
{
    sink.enter_context(&context.dn)?;
    let table = context.change_table();

    let latest = match changes::count_changes(backend, schema, &table).await? {
        TableLookup::Found(count) if count > 0 => {
            debug!(%table, count, "change table has entries");
            changes::latest_change_id(backend, schema, &table)
                .await?
                .found()
                .flatten()
        }
        _ => None,
    };
    let Some(latest) = latest else {
        return no_data(sink, context);
    };

    let applied = match changes::consumers(
        backend,
        schema,
        &table,
        ChangeOffset::LastSuccessful,
        replica,
    )
    .await?
    {
        TableLookup::Found(consumers) => consumers,
        TableLookup::Missing => return no_data(sink, context),
    };
    let pending = changes::consumers(backend, schema, &table, ChangeOffset::OldestPending, replica)
        .await?
        .found()
        .unwrap_or_default();

    // Consumers whose applied change was purged only show up at offset 1.
    let mut rows: Vec<ConsumerRows<'_>> = applied.iter().map(ConsumerRows::applied).collect();
    for row in &pending {
        match rows.iter_mut().find(|r| r.name == row.name) {
            Some(existing) => existing.pending = Some(row.control.as_str()),
            None => {
                debug!(consumer = %row.name, "consumer has no applied change row");
                rows.push(ConsumerRows::pending(row));
            }
        }
    }

    let mut decode_failures = 0;
    let mut age_of = |control: Option<&str>, name: &str, missing: ChangeAge| match control {
        Some(control) => {
            let age = change_age(name, control, now);
            if age == ChangeAge::Unavailable {
                decode_failures += 1;
            }
            age
        }
        None => missing,
    };

    for consumer in &rows {
        let last = age_of(consumer.applied, consumer.name, ChangeAge::Unavailable);
        let oldest = age_of(consumer.pending, consumer.name, ChangeAge::NoChange);

        let queue = QueueLength::between(latest, consumer.last_change_id);
        if queue.clamped {
            warn!(
                consumer = %consumer.name,
                %latest,
                last_change_id = %consumer.last_change_id,
                "consumer is ahead of the latest change, clamping queue length to 0"
            );
        }

        sink.last_successful(consumer.name, &last)?;
        sink.queue_length(consumer.name, consumer.last_change_id, queue)?;
        sink.oldest_pending(consumer.name, &oldest)?;
    }

    Ok(ContextOutcome::Reported {
        consumers: rows.len() as u64,
        decode_failures,
    })
}

/// A consumer with the controls of its rows at offset 0 and offset 1.
struct ConsumerRows<'a> {
    name: &'a str,
    last_change_id: ChangeId,
    applied: Option<&'a str>,
    pending: Option<&'a str>,
}

impl<'a> ConsumerRows<'a> {
    fn applied(row: &'a ReplicationConsumer) -> Self {
        Self {
            name: &row.name,
            last_change_id: row.last_change_id,
            applied: Some(row.control.as_str()),
            pending: None,
        }
    }

    fn pending(row: &'a ReplicationConsumer) -> Self {
        Self {
            name: &row.name,
            last_change_id: row.last_change_id,
            applied: None,
            pending: Some(row.control.as_str()),
        }
    }
}

/// Report replication lag for every context of `schema`.
///
/// `now` is the reference point for ages. When `replica` is set, only that
/// consumer is reported. Fails only if the contexts cannot be listed or
/// the sink cannot be written.
pub async fn report_contexts<B, S>(
    backend: &B,
    schema: &Schema,
    replica: Option<&str>,
    sink: &mut S,
    now: DateTime<Utc>,
) -> Result<RunSummary>
where
    B: Backend + ?Sized,
    S: ReportSink + ?Sized,
{
    let contexts = backend.replication_contexts(schema).await?;
    info!(
        source = %backend.describe(),
        %schema,
        count = contexts.len(),
        "found replication contexts"
    );

    sink.start_report()?;
    let mut summary = RunSummary::default();

    for context in &contexts {
        debug!(eid = %context.entry_id, context = %context.dn, "reporting context");

        let outcome = match report_context(backend, schema, context, replica, sink, now).await {
            Ok(outcome) => outcome,
            Err(MetricsError::Store(e)) => {
                error!(context = %context.dn, error = %e, "aborting context");
                ContextOutcome::Failed
            }
            Err(e) => return Err(e),
        };
        summary.record(outcome);
    }

    sink.finish(&summary)?;
    info!(
        contexts = summary.contexts,
        consumers = summary.consumers,
        failed = summary.failed,
        decode_failures = summary.decode_failures,
        "metrics run complete"
    );
    Ok(summary)
}
