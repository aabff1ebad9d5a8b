use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// State directory: `$OUTLAY_HOME`, else `~/.outlay`.
pub fn outlay_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("OUTLAY_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".outlay"))
}

pub fn ensure_outlay_home() -> Result<PathBuf> {
    let dir = outlay_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn ledger_path() -> Result<PathBuf> {
    Ok(ensure_outlay_home()?.join("ledger.json"))
}
