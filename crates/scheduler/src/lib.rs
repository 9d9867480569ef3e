//! The alarm scheduler: a fixed-cadence sweep over the alarm table.
//!
//! Every `check_interval` the scheduler runs one pass inside a single store
//! transaction:
//! 1. Alarms older than one full interval are stale — handled per the
//!    configured missed-alarm policy (dropped silently, or fired once marked
//!    late).
//! 2. Alarms in the fire window `now - interval < t <= now` fire: an event is
//!    enqueued and the row is deleted.
//!
//! Events are pushed to the queue only after the transaction commits. If the
//! commit fails, nothing fired and the rows survive for the next pass; if the
//! process dies after commit but before the events are processed, they are
//! lost (at-most-once delivery).
//!
//! A failed pass is logged and abandoned; the loop keeps its cadence.

pub mod processor;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use bruin_config::MissedAlarmPolicy;
use bruin_core::error::StoreError;
use bruin_core::event::{EventContext, EventQueue};
use bruin_core::Alarm;
use bruin_store::SqliteAlarmStore;

/// Outcome of one check pass, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Alarms fired on time
    pub fired: usize,
    /// Stale alarms deleted without firing
    pub dropped: usize,
    /// Stale alarms fired late (FireLateOnce policy)
    pub fired_late: usize,
}

/// The periodic alarm sweep loop.
pub struct AlarmScheduler {
    store: Arc<SqliteAlarmStore>,
    queue: EventQueue,
    check_interval: std::time::Duration,
    missed_policy: MissedAlarmPolicy,
}

impl AlarmScheduler {
    pub fn new(
        store: Arc<SqliteAlarmStore>,
        queue: EventQueue,
        check_interval: std::time::Duration,
        missed_policy: MissedAlarmPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            check_interval,
            missed_policy,
        }
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            policy = ?self.missed_policy,
            "alarm scheduler started"
        );

        // First pass runs immediately, catching alarms that came due while
        // the process was down.
        loop {
            match self.tick(Utc::now()).await {
                Ok(report) => {
                    if report != TickReport::default() {
                        info!(
                            fired = report.fired,
                            dropped = report.dropped,
                            fired_late = report.fired_late,
                            "alarm sweep complete"
                        );
                    } else {
                        debug!("alarm sweep: nothing due");
                    }
                }
                Err(e) => {
                    // Abandon this pass; the rolled-back alarms are picked up
                    // on the next one.
                    error!("alarm sweep failed: {e}");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                _ = shutdown.recv() => {
                    info!("alarm scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Run one check pass at the given instant.
    ///
    /// `now` is injected so the fire-window arithmetic is testable without a
    /// wall clock.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
        let interval = Duration::from_std(self.check_interval)
            .map_err(|e| StoreError::Storage(format!("check interval out of range: {e}")))?;
        let cutoff = now - interval;

        let mut sweep = self.store.begin_sweep().await?;
        let mut report = TickReport::default();
        let mut pending = Vec::new();

        for alarm in sweep.stale(cutoff).await? {
            match self.missed_policy {
                MissedAlarmPolicy::Drop => {
                    warn!(
                        alarm_id = alarm.id,
                        trigger_time = %alarm.trigger_time,
                        "dropping stale alarm without firing"
                    );
                    report.dropped += 1;
                }
                MissedAlarmPolicy::FireLateOnce => {
                    warn!(
                        alarm_id = alarm.id,
                        trigger_time = %alarm.trigger_time,
                        "firing stale alarm late"
                    );
                    pending.push(alarm_event(&alarm, true));
                    report.fired_late += 1;
                }
            }
            sweep.remove(alarm.id).await?;
        }

        // Ascending trigger-time order, so processing order within the pass
        // matches trigger order.
        for alarm in sweep.due(cutoff, now).await? {
            debug!(alarm_id = alarm.id, "alarm due");
            pending.push(alarm_event(&alarm, false));
            sweep.remove(alarm.id).await?;
            report.fired += 1;
        }

        sweep.commit().await?;

        for event in pending {
            self.queue.push(event);
        }

        Ok(report)
    }
}

/// Build the queue payload for one fired alarm.
fn alarm_event(alarm: &Alarm, late: bool) -> EventContext {
    let mut description = format!(
        "Alarm fired for user {}: {} (scheduled for {})",
        alarm.user_id,
        alarm.description,
        alarm.trigger_time.to_rfc3339()
    );
    if late {
        description.push_str(" [missed, firing late]");
    }

    let mut additional_data = serde_json::Map::new();
    additional_data.insert("alarm_id".into(), serde_json::json!(alarm.id));
    additional_data.insert("user_id".into(), serde_json::json!(alarm.user_id));
    additional_data.insert("channel_id".into(), serde_json::json!(alarm.channel_id));
    additional_data.insert(
        "trigger_time".into(),
        serde_json::json!(alarm.trigger_time.to_rfc3339()),
    );
    additional_data.insert("late".into(), serde_json::json!(late));

    EventContext {
        event_source: "alarm_scheduler".into(),
        event_description: description,
        additional_data,
    }
}
