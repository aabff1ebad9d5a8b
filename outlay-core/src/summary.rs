//! Grouped spending totals (per month, per category).

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::expense::Expense;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: u32,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: f64,
}

/// Totals per month of `year` for one owner, months without spending omitted.
pub fn monthly_summary(expenses: &[Expense], owner_id: i64, year: i32) -> Vec<MonthlySummary> {
    let mut totals: BTreeMap<u32, f64> = BTreeMap::new();
    for e in expenses
        .iter()
        .filter(|e| e.owner_id == owner_id && e.date.year() == year)
    {
        *totals.entry(e.date.month()).or_default() += e.amount;
    }
    totals
        .into_iter()
        .map(|(month, total)| MonthlySummary { month, total })
        .collect()
}

/// All-time totals per category for one owner, ordered by category name.
pub fn category_summary(expenses: &[Expense], owner_id: i64) -> Vec<CategorySummary> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for e in expenses.iter().filter(|e| e.owner_id == owner_id) {
        *totals.entry(e.category.as_str()).or_default() += e.amount;
    }
    totals
        .into_iter()
        .map(|(category, total)| CategorySummary {
            category: category.to_string(),
            total,
        })
        .collect()
}
