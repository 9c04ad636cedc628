use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_chronopack_home;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scheduling: SchedulingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingSection {
    pub timezone: String,
    pub buffer_hours: f64,
    pub break_after_task_minutes: i32,
    pub max_days: u32,
    pub notification_limit_per_day: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduling: SchedulingSection {
                timezone: "America/Chicago".to_string(),
                buffer_hours: 1.0,
                break_after_task_minutes: 5,
                max_days: 14,
                notification_limit_per_day: 5,
            },
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_chronopack_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}
