//! Trigger adapters: a daily timer and an on-demand entry point, both driving the
//! same `DueSetProcessor`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use outlay_core::{local_today, next_daily_fire, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::processor::{DueSetProcessor, ProcessReport};

pub const PROCESSED_MESSAGE: &str = "Due recurring expenses processed successfully";

/// Body returned to API callers of the on-demand trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDueResponse {
    pub message: String,
    pub created_expenses: usize,
}

#[derive(Clone)]
pub struct OnDemandTrigger {
    processor: Arc<DueSetProcessor>,
}

impl OnDemandTrigger {
    pub fn new(processor: Arc<DueSetProcessor>) -> Self {
        Self { processor }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<ProcessDueResponse> {
        let report = self.processor.process_due(today).await?;
        Ok(ProcessDueResponse {
            message: PROCESSED_MESSAGE.to_string(),
            created_expenses: report.created,
        })
    }
}

/// Local wall-clock time at which the timer fires each day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    pub timezone: Tz,
    pub run_at: NaiveTime,
}

impl DailySchedule {
    pub fn next_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_daily_fire(now, self.timezone, self.run_at)
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_today(now, self.timezone)
    }
}

pub struct DailyTrigger {
    processor: Arc<DueSetProcessor>,
    schedule: DailySchedule,
}

impl DailyTrigger {
    pub fn new(processor: Arc<DueSetProcessor>, schedule: DailySchedule) -> Self {
        Self {
            processor,
            schedule,
        }
    }

    /// Process everything due as of the local date of `now`.
    ///
    /// Runs in its own task so a panic is contained; errors are logged and swallowed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Option<ProcessReport> {
        let today = self.schedule.today(now);
        let processor = Arc::clone(&self.processor);
        match tokio::spawn(async move { processor.process_due(today).await }).await {
            Ok(Ok(report)) => {
                if report.created > 0 {
                    info!(%today, created = report.created, "recurring scheduler created expenses");
                }
                Some(report)
            }
            Ok(Err(e)) => {
                error!(%today, error = %e, "recurring scheduler run failed");
                None
            }
            Err(e) => {
                error!(%today, error = %e, "recurring scheduler run panicked");
                None
            }
        }
    }

    /// Fire once per local day until `shutdown` flips to true or its sender drops.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last_run: Option<NaiveDate> = None;
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let now = Utc::now();
                let fire_at = self.schedule.next_fire(now);
                let wait = (fire_at - now).to_std().unwrap_or_default();
                info!(
                    next_run = %fire_at,
                    timezone = %self.schedule.timezone,
                    "recurring scheduler sleeping"
                );

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let now = Utc::now();
                let today = self.schedule.today(now);
                if last_run == Some(today) {
                    warn!(%today, "recurring scheduler woke twice for the same day, skipping");
                    continue;
                }
                last_run = Some(today);
                self.run_once(now).await;
            }
            info!("recurring scheduler stopped");
        })
    }
}
