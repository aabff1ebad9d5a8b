use anyhow::{Context, Result};
use outlay_core::{parse_timezone, parse_wall_time, BudgetThresholds};
use outlay_recurring::{DailySchedule, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::ensure_outlay_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub processing: ProcessingSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub user: UserSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub enabled: bool,
    /// IANA timezone that defines "today" for the daily run.
    pub timezone: String,
    /// Local wall-clock time, HH:MM.
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSection {
    pub warning_percent: f64,
    pub exceeded_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSection {
    pub owner_id: i64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "UTC".to_string(),
            run_at: "00:05".to_string(),
        }
    }
}

impl Default for ProcessingSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for BudgetSection {
    fn default() -> Self {
        let t = BudgetThresholds::default();
        Self {
            warning_percent: t.warning_percent,
            exceeded_percent: t.exceeded_percent,
        }
    }
}

impl Default for UserSection {
    fn default() -> Self {
        Self { owner_id: 1 }
    }
}

impl Config {
    pub fn schedule(&self) -> Result<DailySchedule> {
        let timezone = parse_timezone(&self.scheduler.timezone).context("[scheduler] timezone")?;
        let run_at = parse_wall_time(&self.scheduler.run_at).context("[scheduler] run_at")?;
        Ok(DailySchedule { timezone, run_at })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.processing.max_attempts.max(1),
            backoff: Duration::from_millis(self.processing.retry_backoff_ms),
        }
    }

    pub fn thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            warning_percent: self.budget.warning_percent,
            exceeded_percent: self.budget.exceeded_percent,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_outlay_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
