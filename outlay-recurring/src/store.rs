//! Persistence traits consumed by the engine.
//!
//! The processor only depends on `list_due`, `update_next_due_date` and
//! `create_batch`; the remaining methods back the template service and reporting.

use async_trait::async_trait;
use chrono::NaiveDate;
use outlay_core::{Expense, NewExpense, RecurringTemplate, Result};
use uuid::Uuid;

/// Result of a conditional due-date update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The stored date no longer matched the expected one.
    Conflict,
}

/// Append-only store of expense records. Never deduplicates.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create(&self, expense: NewExpense) -> Result<Uuid>;

    /// Persist several expenses, returning ids in input order.
    ///
    /// The default is a plain loop and is NOT atomic; stores that can commit all or
    /// nothing should override it.
    async fn create_batch(&self, expenses: &[NewExpense]) -> Result<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(expenses.len());
        for expense in expenses {
            ids.push(self.create(expense.clone()).await?);
        }
        Ok(ids)
    }

    /// Owner's expenses, newest first.
    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Expense>>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Active templates with `next_due_date <= cutoff`, oldest due date first.
    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RecurringTemplate>>;

    /// Set `next_due_date` to `next` only if it currently equals `expected`.
    /// Unknown ids are `NotFound`.
    async fn update_next_due_date(
        &self,
        id: Uuid,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<UpdateOutcome>;

    async fn get(&self, id: Uuid) -> Result<Option<RecurringTemplate>>;

    async fn insert(&self, template: RecurringTemplate) -> Result<()>;

    /// Replace an existing template. Unknown ids are `NotFound`.
    async fn save(&self, template: &RecurringTemplate) -> Result<()>;

    /// Flip `active` without touching any other field. Unknown ids are `NotFound`.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<()>;

    /// Unknown ids are `NotFound`.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Owner's templates ordered by `next_due_date`.
    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<RecurringTemplate>>;
}
