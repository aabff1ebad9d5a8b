//! Expense records, materialized or entered directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutlayError, Result};

/// A persisted, dated expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub owner_id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    /// Template that generated this expense, for auditing. `None` for direct entries.
    #[serde(default)]
    pub recurring_id: Option<Uuid>,
}

/// An expense not yet assigned an id by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub owner_id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
    pub recurring_id: Option<Uuid>,
}

impl NewExpense {
    /// Direct user entry.
    pub fn manual(
        owner_id: i64,
        title: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Self> {
        let title = title.into().trim().to_string();
        let category = category.into().trim().to_string();
        if title.is_empty() || category.is_empty() {
            return Err(OutlayError::InvalidExpense(
                "expense title and category are required".into(),
            ));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(OutlayError::InvalidExpense(format!(
                "expense amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            owner_id,
            title,
            amount,
            category,
            date,
            recurring_id: None,
        })
    }

    pub fn into_expense(self, id: Uuid) -> Expense {
        Expense {
            id,
            owner_id: self.owner_id,
            title: self.title,
            amount: self.amount,
            category: self.category,
            date: self.date,
            recurring_id: self.recurring_id,
        }
    }
}
