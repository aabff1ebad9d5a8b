//! Monthly budgets and the spent/remaining/alert arithmetic derived from expenses.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutlayError, Result};
use crate::expense::Expense;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub owner_id: i64,
    pub monthly_limit: f64,
    /// 1-12
    pub month: u32,
    pub year: i32,
}

impl Budget {
    pub fn new(owner_id: i64, month: u32, year: i32, monthly_limit: f64) -> Result<Self> {
        validate(month, year, monthly_limit)?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id,
            monthly_limit,
            month,
            year,
        })
    }

    pub fn set_limit(&mut self, monthly_limit: f64) -> Result<()> {
        validate(self.month, self.year, monthly_limit)?;
        self.monthly_limit = monthly_limit;
        Ok(())
    }

    pub fn covers(&self, owner_id: i64, date: NaiveDate) -> bool {
        self.owner_id == owner_id && date.year() == self.year && date.month() == self.month
    }
}

fn validate(month: u32, year: i32, monthly_limit: f64) -> Result<()> {
    if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(OutlayError::InvalidBudget(format!(
            "no such month {year}-{month:02}"
        )));
    }
    if !monthly_limit.is_finite() || monthly_limit <= 0.0 {
        return Err(OutlayError::InvalidBudget(format!(
            "monthly limit must be positive, got {monthly_limit}"
        )));
    }
    Ok(())
}

/// Percent-used levels at which a budget raises an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    pub warning_percent: f64,
    pub exceeded_percent: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            exceeded_percent: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum BudgetAlert {
    Warning { percent_used: f64 },
    Exceeded,
}

impl BudgetAlert {
    pub fn message(&self) -> String {
        match self {
            BudgetAlert::Warning { percent_used } => {
                format!("You have used {percent_used:.0}% of your budget.")
            }
            BudgetAlert::Exceeded => "You exceeded your budget!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub budget_id: Uuid,
    pub monthly_limit: f64,
    pub month: u32,
    pub year: i32,
    pub spent: f64,
    pub remaining: f64,
    pub percent_used: f64,
    pub alert: Option<BudgetAlert>,
}

/// Sum the owner's expenses inside the budget month and classify against thresholds.
pub fn budget_status(
    budget: &Budget,
    expenses: &[Expense],
    thresholds: BudgetThresholds,
) -> BudgetStatus {
    let spent: f64 = expenses
        .iter()
        .filter(|e| budget.covers(e.owner_id, e.date))
        .map(|e| e.amount)
        .sum();

    let percent_used = if budget.monthly_limit > 0.0 {
        spent / budget.monthly_limit * 100.0
    } else {
        0.0
    };

    let alert = if percent_used >= thresholds.exceeded_percent {
        Some(BudgetAlert::Exceeded)
    } else if percent_used >= thresholds.warning_percent {
        Some(BudgetAlert::Warning { percent_used })
    } else {
        None
    };

    BudgetStatus {
        budget_id: budget.id,
        monthly_limit: budget.monthly_limit,
        month: budget.month,
        year: budget.year,
        spent,
        remaining: budget.monthly_limit - spent,
        percent_used,
        alert,
    }
}
