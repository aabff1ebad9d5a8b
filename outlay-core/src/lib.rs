//! outlay-core: domain types and pure arithmetic for the Outlay expense tracker

pub mod budget;
pub mod error;
pub mod expense;
pub mod recurring;
pub mod summary;
pub mod time;

pub use budget::{budget_status, Budget, BudgetAlert, BudgetStatus, BudgetThresholds};
pub use error::{OutlayError, Result};
pub use expense::{Expense, NewExpense};
pub use recurring::{Frequency, RecurringTemplate, TemplateDraft, TemplateFields};
pub use summary::{category_summary, monthly_summary, CategorySummary, MonthlySummary};
pub use time::{local_today, next_daily_fire, parse_timezone, parse_wall_time, step};
