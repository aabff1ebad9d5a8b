//! JSON-file persistence for templates, expenses and budgets.
//!
//! The file is the only copy of the ledger. Every call takes an advisory lock on
//! `<path>.lock` (shared for reads, exclusive for mutations), loads the file, and for
//! mutations writes the result to `<path>.tmp` and renames it over `<path>` before
//! releasing the lock. Separate processes on one path (`outlay serve` next to
//! `outlay process-due`) therefore always check and update the latest state.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use fd_lock::RwLock;
use outlay_core::{Budget, Expense, NewExpense, OutlayError, RecurringTemplate, Result};
use outlay_recurring::{ExpenseStore, TemplateStore, UpdateOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

const TEMPLATE: &str = "Recurring expense";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    #[serde(default)]
    templates: Vec<RecurringTemplate>,
    #[serde(default)]
    expenses: Vec<Expense>,
    #[serde(default)]
    budgets: Vec<Budget>,
}

impl Ledger {
    fn template_mut(&mut self, id: Uuid) -> Result<&mut RecurringTemplate> {
        self.templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| OutlayError::not_found(TEMPLATE, id))
    }
}

pub struct LedgerFile {
    path: PathBuf,
    lock_path: PathBuf,
    /// Queues callers of this handle so they wait here instead of on the file lock.
    local: Mutex<()>,
}

impl LedgerFile {
    /// Check that `path` is absent or a readable ledger.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        let ledger = Self {
            lock_path: lock_path.into(),
            path,
            local: Mutex::new(()),
        };
        ledger
            .read(|_| ())
            .await
            .with_context(|| format!("open {}", ledger.path.display()))?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<RwLock<fs::File>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| io_error("open", &self.lock_path, e))?;
        Ok(RwLock::new(file))
    }

    async fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Result<T> {
        let _local = self.local.lock().await;
        let lock = self.lock_file()?;
        let _shared = lock.read().map_err(|e| io_error("lock", &self.lock_path, e))?;
        Ok(f(&load(&self.path)?))
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<T>) -> Result<T> {
        let _local = self.local.lock().await;
        let mut lock = self.lock_file()?;
        let _exclusive = lock.write().map_err(|e| io_error("lock", &self.lock_path, e))?;
        let mut ledger = load(&self.path)?;
        let out = f(&mut ledger)?;
        write_atomically(&self.path, &ledger)?;
        Ok(out)
    }

    /// Create or replace the owner's budget for one month.
    pub async fn set_budget(
        &self,
        owner_id: i64,
        month: u32,
        year: i32,
        monthly_limit: f64,
    ) -> Result<Budget> {
        self.mutate(|ledger| {
            if let Some(existing) = ledger
                .budgets
                .iter_mut()
                .find(|b| b.owner_id == owner_id && b.month == month && b.year == year)
            {
                existing.set_limit(monthly_limit)?;
                return Ok(existing.clone());
            }
            let budget = Budget::new(owner_id, month, year, monthly_limit)?;
            ledger.budgets.push(budget.clone());
            Ok(budget)
        })
        .await
    }

    pub async fn budget_for(&self, owner_id: i64, month: u32, year: i32) -> Result<Option<Budget>> {
        self.read(|ledger| {
            ledger
                .budgets
                .iter()
                .find(|b| b.owner_id == owner_id && b.month == month && b.year == year)
                .cloned()
        })
        .await
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> OutlayError {
    OutlayError::TransientStore(format!("{action} {}: {e}", path.display()))
}

/// A missing file is an empty ledger.
fn load(path: &Path) -> Result<Ledger> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s)
            .map_err(|e| OutlayError::Storage(format!("parse {}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Ledger::default()),
        Err(e) => Err(io_error("read", path, e)),
    }
}

fn write_atomically(path: &Path, ledger: &Ledger) -> Result<()> {
    let json = serde_json::to_vec_pretty(ledger)
        .map_err(|e| OutlayError::Storage(format!("serialize ledger: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| io_error("write", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_error("rename", &tmp, e))
}

#[async_trait]
impl ExpenseStore for LedgerFile {
    async fn create(&self, expense: NewExpense) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.mutate(|ledger| {
            ledger.expenses.push(expense.into_expense(id));
            Ok(id)
        })
        .await
    }

    async fn create_batch(&self, expenses: &[NewExpense]) -> Result<Vec<Uuid>> {
        self.mutate(|ledger| {
            let ids: Vec<Uuid> = expenses
                .iter()
                .map(|e| {
                    let id = Uuid::new_v4();
                    ledger.expenses.push(e.clone().into_expense(id));
                    id
                })
                .collect();
            Ok(ids)
        })
        .await
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Expense>> {
        let mut out: Vec<Expense> = self
            .read(|ledger| {
                ledger
                    .expenses
                    .iter()
                    .filter(|e| e.owner_id == owner_id)
                    .cloned()
                    .collect()
            })
            .await?;
        out.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(out)
    }
}

#[async_trait]
impl TemplateStore for LedgerFile {
    async fn list_due(&self, cutoff: NaiveDate) -> Result<Vec<RecurringTemplate>> {
        let mut due: Vec<RecurringTemplate> = self
            .read(|ledger| {
                ledger
                    .templates
                    .iter()
                    .filter(|t| t.is_due(cutoff))
                    .cloned()
                    .collect()
            })
            .await?;
        due.sort_by_key(|t| (t.next_due_date, t.id));
        Ok(due)
    }

    async fn update_next_due_date(
        &self,
        id: Uuid,
        expected: NaiveDate,
        next: NaiveDate,
    ) -> Result<UpdateOutcome> {
        // Compared against the file as loaded under the exclusive lock.
        self.mutate(|ledger| {
            let template = ledger.template_mut(id)?;
            if template.next_due_date != expected {
                return Ok(UpdateOutcome::Conflict);
            }
            template.next_due_date = next;
            Ok(UpdateOutcome::Applied)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<RecurringTemplate>> {
        self.read(|ledger| ledger.templates.iter().find(|t| t.id == id).cloned())
            .await
    }

    async fn insert(&self, template: RecurringTemplate) -> Result<()> {
        self.mutate(|ledger| {
            ledger.templates.retain(|t| t.id != template.id);
            ledger.templates.push(template);
            Ok(())
        })
        .await
    }

    async fn save(&self, template: &RecurringTemplate) -> Result<()> {
        self.mutate(|ledger| {
            *ledger.template_mut(template.id)? = template.clone();
            Ok(())
        })
        .await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        self.mutate(|ledger| {
            ledger.template_mut(id)?.active = active;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.mutate(|ledger| {
            let before = ledger.templates.len();
            ledger.templates.retain(|t| t.id != id);
            if ledger.templates.len() == before {
                return Err(OutlayError::not_found(TEMPLATE, id));
            }
            Ok(())
        })
        .await
    }

    async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<RecurringTemplate>> {
        let mut out: Vec<RecurringTemplate> = self
            .read(|ledger| {
                ledger
                    .templates
                    .iter()
                    .filter(|t| t.owner_id == owner_id)
                    .cloned()
                    .collect()
            })
            .await?;
        out.sort_by_key(|t| (t.next_due_date, t.id));
        Ok(out)
    }
}
