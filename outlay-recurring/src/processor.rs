//! Due-Set Processor: materialize and commit every due template.
//!
//! Each template is one unit of work:
//! 1. claim: conditionally advance `next_due_date` (lost race => skip)
//! 2. create: persist all occurrences in one batch
//! 3. release: if creation ultimately fails, conditionally restore the old due date
//!    so the next run picks the template up again
//!
//! Occurrences are only created after a successful claim, so two processors sharing
//! a store never both commit the same template.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use outlay_core::{OutlayError, RecurringTemplate, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::materializer::{materialize, Materialization};
use crate::store::{ExpenseStore, TemplateStore, UpdateOutcome};

/// Bounded retry for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(operation, attempt, error = %e, "transient store failure, retrying");
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// A template whose occurrences were not committed this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateFailure {
    pub template_id: Uuid,
    pub error: String,
    /// The template still carries its old due date and will be retried next run.
    pub will_retry: bool,
}

/// Outcome of one `process_due` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessReport {
    pub cutoff: NaiveDate,
    /// Expenses created across all templates.
    pub created: usize,
    pub templates_processed: usize,
    /// Templates skipped because another run advanced or deleted them first.
    pub conflicts: usize,
    pub failures: Vec<TemplateFailure>,
}

impl ProcessReport {
    fn new(cutoff: NaiveDate) -> Self {
        Self {
            cutoff,
            created: 0,
            templates_processed: 0,
            conflicts: 0,
            failures: Vec::new(),
        }
    }
}

enum TemplateOutcome {
    Committed(usize),
    Skipped,
    Failed(TemplateFailure),
}

pub struct DueSetProcessor {
    expenses: Arc<dyn ExpenseStore>,
    templates: Arc<dyn TemplateStore>,
    retry: RetryPolicy,
    run_lock: Mutex<()>,
}

impl DueSetProcessor {
    pub fn new(expenses: Arc<dyn ExpenseStore>, templates: Arc<dyn TemplateStore>) -> Self {
        Self {
            expenses,
            templates,
            retry: RetryPolicy::default(),
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Materialize and commit every template due on or before `cutoff`.
    ///
    /// Per-template failures are reported, not returned. Only failing to list due
    /// templates aborts the call.
    pub async fn process_due(&self, cutoff: NaiveDate) -> Result<ProcessReport> {
        let _run = self.run_lock.lock().await;

        let due = self.fetch_due(cutoff).await?;
        let mut report = ProcessReport::new(cutoff);

        for template in due.iter().filter(|t| t.is_due(cutoff)) {
            match self.process_template(template, cutoff).await {
                TemplateOutcome::Committed(created) => {
                    report.created += created;
                    report.templates_processed += 1;
                }
                TemplateOutcome::Skipped => report.conflicts += 1,
                TemplateOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        if report.created > 0 || !report.failures.is_empty() {
            info!(
                %cutoff,
                created = report.created,
                templates = report.templates_processed,
                conflicts = report.conflicts,
                failed = report.failures.len(),
                "processed due recurring expenses"
            );
        } else {
            debug!(%cutoff, conflicts = report.conflicts, "no recurring expenses due");
        }
        Ok(report)
    }

    /// Materialize due templates without writing anything.
    pub async fn preview(&self, cutoff: NaiveDate) -> Result<Vec<Materialization>> {
        let due = self.fetch_due(cutoff).await?;
        Ok(due
            .iter()
            .filter(|t| t.is_due(cutoff))
            .map(|t| materialize(t, cutoff))
            .collect())
    }

    async fn fetch_due(&self, cutoff: NaiveDate) -> Result<Vec<RecurringTemplate>> {
        let templates = &self.templates;
        self.retry
            .run("list_due", move || templates.list_due(cutoff))
            .await
            .map_err(|e| match e {
                OutlayError::StoreUnavailable(_) => e,
                other => OutlayError::StoreUnavailable(other.to_string()),
            })
    }

    async fn process_template(
        &self,
        template: &RecurringTemplate,
        cutoff: NaiveDate,
    ) -> TemplateOutcome {
        let plan = materialize(template, cutoff);
        if plan.is_empty() {
            return TemplateOutcome::Committed(0);
        }
        let id = plan.template_id;
        let (previous, next) = (plan.previous_due_date, plan.next_due_date);
        let templates = &self.templates;

        let claim = self
            .retry
            .run("update_next_due_date", move || {
                templates.update_next_due_date(id, previous, next)
            })
            .await;
        match claim {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::Conflict) | Err(OutlayError::ConcurrentUpdateConflict) => {
                debug!(template_id = %id, "recurring template already advanced by another run");
                return TemplateOutcome::Skipped;
            }
            Err(OutlayError::NotFound { .. }) => {
                debug!(template_id = %id, "recurring template deleted during run");
                return TemplateOutcome::Skipped;
            }
            Err(e) => {
                warn!(template_id = %id, error = %e, "could not claim recurring template, skipping");
                return TemplateOutcome::Failed(TemplateFailure {
                    template_id: id,
                    error: e.to_string(),
                    will_retry: true,
                });
            }
        }

        let expenses = &self.expenses;
        let occurrences = plan.occurrences.as_slice();
        match self
            .retry
            .run("create_batch", move || expenses.create_batch(occurrences))
            .await
        {
            Ok(ids) => {
                debug!(template_id = %id, created = ids.len(), %next, "recurring template committed");
                TemplateOutcome::Committed(ids.len())
            }
            Err(e) => {
                let will_retry = self.release(id, next, previous).await;
                if will_retry {
                    warn!(template_id = %id, error = %e, "creating occurrences failed, due date restored");
                } else {
                    error!(
                        template_id = %id,
                        error = %e,
                        from = %previous,
                        to = %cutoff,
                        "creating occurrences failed and due date could not be restored"
                    );
                }
                TemplateOutcome::Failed(TemplateFailure {
                    template_id: id,
                    error: e.to_string(),
                    will_retry,
                })
            }
        }
    }

    /// Undo a claim. True if the template carries `previous` again.
    async fn release(&self, id: Uuid, claimed: NaiveDate, previous: NaiveDate) -> bool {
        let templates = &self.templates;
        matches!(
            self.retry
                .run("release_next_due_date", move || {
                    templates.update_next_due_date(id, claimed, previous)
                })
                .await,
            Ok(UpdateOutcome::Applied)
        )
    }
}
