//! In-process store implementing both store traits over one mutex-guarded state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use outlay_core::{Expense, NewExpense, OutlayError, RecurringTemplate, Result};
use uuid::Uuid;

use crate::store::{ExpenseStore, TemplateStore, UpdateOutcome};

#[derive(Debug, Default)]
struct State {
    templates: HashMap<Uuid, RecurringTemplate>,
    expenses: Vec<Expense>,
}

/// Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored expense in insertion order.
    pub fn expenses(&self) -> Vec<Expense> {
        self.lock().expenses.clone()
    }

    pub fn template(&self, id: Uuid) -> Option<RecurringTemplate> {
        self.lock().templates.get(&id).cloned()
    }
}

#[async_trait]
impl ExpenseStore for InMemoryStore {
    async fn create(&self, expense: NewExpense) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.lock().expenses.push(expense.into_expense(id));
        Ok(id)
    }

    async fn create_batch(&self, expenses: &[NewExpense]) -> Result<Vec<Uuid>> {
        let mut state = self.lock();
        let ids: Vec<Uuid> = expenses.iter().map(|_| Uuid::new_v4()).collect();
        state.expenses.extend(
            expenses
                .iter()
                .cloned()
                .zip(&ids)
                .map(|(e, id)| e.into_expense(*id)),
        );
        Ok(ids)
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Expense>> {
        let mut out: Vec<Expense> = self
            .lock()
            .expenses
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(out)
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RecurringTemplate>> {
        let mut due: Vec<RecurringTemplate> = self
            .lock()
            .templates
            .values()
            .filter(|t| t.is_due(cutoff))
            .cloned()
            .collect();
        due.sort_by_key(|t| (t.next_due_date, t.id));
        Ok(due)
    }

    async fn update_next_due_date(
        &self,
        id: Uuid,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<UpdateOutcome> {
        let mut state = self.lock();
        let template = state
            .templates
            .get_mut(&id)
            .ok_or_else(|| OutlayError::not_found("Recurring expense", id))?;
        if template.next_due_date != expected {
            return Ok(UpdateOutcome::Conflict);
        }
        template.next_due_date = next;
        Ok(UpdateOutcome::Applied)
    }

    async fn get(&self, id: Uuid) -> Result<Option<RecurringTemplate>> {
        Ok(self.template(id))
    }

    async fn insert(&self, template: RecurringTemplate) -> Result<()> {
        self.lock().templates.insert(template.id, template);
        Ok(())
    }

    async fn save(&self, template: &RecurringTemplate) -> Result<()> {
        let mut state = self.lock();
        match state.templates.get_mut(&template.id) {
            Some(slot) => {
                *slot = template.clone();
                Ok(())
            }
            None => Err(OutlayError::not_found("Recurring expense", template.id)),
        }
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        let mut state = self.lock();
        let template = state
            .templates
            .get_mut(&id)
            .ok_or_else(|| OutlayError::not_found("Recurring expense", id))?;
        template.active = active;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.lock()
            .templates
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| OutlayError::not_found("Recurring expense", id))
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<RecurringTemplate>> {
        let mut out: Vec<RecurringTemplate> = self
            .lock()
            .templates
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by_key(|t| (t.next_due_date, t.id));
        Ok(out)
    }
}
