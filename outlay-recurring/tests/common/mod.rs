#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use outlay_core::{
    Expense, Frequency, NewExpense, OutlayError, RecurringTemplate, Result, TemplateFields,
};
use outlay_recurring::{ExpenseStore, InMemoryStore, TemplateStore, UpdateOutcome};
use tokio::sync::Barrier;
use uuid::Uuid;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn template(
    title: &str,
    amount: f64,
    frequency: Frequency,
    next_due_date: NaiveDate,
) -> RecurringTemplate {
    RecurringTemplate::new(
        1,
        TemplateFields {
            title: title.to_string(),
            amount,
            category: "bills".to_string(),
            frequency,
            next_due_date,
        },
    )
}

pub async fn seeded(templates: &[RecurringTemplate]) -> InMemoryStore {
    let store = InMemoryStore::new();
    for t in templates {
        store.insert(t.clone()).await.unwrap();
    }
    store
}

pub fn dates_for(store: &InMemoryStore, template_id: Uuid) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = store
        .expenses()
        .into_iter()
        .filter(|e| e.recurring_id == Some(template_id))
        .map(|e| e.date)
        .collect();
    dates.sort();
    dates
}

/// Wraps `InMemoryStore` with switchable faults.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    /// Next N `create_batch` calls fail transiently.
    pub transient_batch_failures: AtomicU32,
    /// Batches for this template always fail permanently.
    pub broken_template: Mutex<Option<Uuid>>,
    pub list_due_down: AtomicBool,
    /// When set, `list_due` waits here before returning.
    pub list_barrier: Option<Arc<Barrier>>,
    /// Deleted from the inner store right after `list_due` reads it.
    pub delete_after_list: Mutex<Option<Uuid>>,
    pub batch_calls: AtomicU32,
}

impl FaultyStore {
    pub fn wrapping(inner: InMemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn break_template(&self, id: Option<Uuid>) {
        *self.broken_template.lock().unwrap() = id;
    }
}

#[async_trait]
impl ExpenseStore for FaultyStore {
    async fn create(&self, expense: NewExpense) -> Result<Uuid> {
        self.inner.create(expense).await
    }

    async fn create_batch(&self, expenses: &[NewExpense]) -> Result<Vec<Uuid>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let broken = *self.broken_template.lock().unwrap();
        if broken.is_some() && expenses.iter().any(|e| e.recurring_id == broken) {
            return Err(OutlayError::Storage("disk full".into()));
        }
        let pending = self.transient_batch_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_batch_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(OutlayError::TransientStore("connection reset".into()));
        }
        self.inner.create_batch(expenses).await
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Expense>> {
        ExpenseStore::list_for_owner(&self.inner, owner_id).await
    }
}

#[async_trait]
impl TemplateStore for FaultyStore {
    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RecurringTemplate>> {
        if self.list_due_down.load(Ordering::SeqCst) {
            return Err(OutlayError::TransientStore("connection refused".into()));
        }
        let due = self.inner.list_due(cutoff).await?;
        let doomed = self.delete_after_list.lock().unwrap().take();
        if let Some(id) = doomed {
            self.inner.delete(id).await?;
        }
        if let Some(barrier) = &self.list_barrier {
            barrier.wait().await;
        }
        Ok(due)
    }

    async fn update_next_due_date(
        &self,
        id: Uuid,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<UpdateOutcome> {
        self.inner.update_next_due_date(id, expected, next).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<RecurringTemplate>> {
        self.inner.get(id).await
    }

    async fn insert(&self, template: RecurringTemplate) -> Result<()> {
        self.inner.insert(template).await
    }

    async fn save(&self, template: &RecurringTemplate) -> Result<()> {
        self.inner.save(template).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        self.inner.set_active(id, active).await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<RecurringTemplate>> {
        TemplateStore::list_for_owner(&self.inner, owner_id).await
    }
}
