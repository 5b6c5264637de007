use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{is_truthy, LoggingConfig};

pub const DEBUG_ENV: &str = "TWEETCLIP_DEBUG";

static INSTALLED: OnceCell<()> = OnceCell::new();

fn debug_forced() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|val| is_truthy(&val))
        .unwrap_or(false)
}

fn default_directive(cfg: &LoggingConfig) -> String {
    if let Some(filter) = cfg.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        return filter.trim().to_string();
    }
    if cfg.debug || debug_forced() {
        "tweetclip=debug".to_string()
    } else {
        "tweetclip=info".to_string()
    }
}

pub fn init(cfg: &LoggingConfig) -> Result<()> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(cfg)))
        .context("logging: invalid filter directive")?;

    match cfg.file.as_ref() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("logging: failed to open {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
                .context("logging: subscriber already installed")?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("logging: subscriber already installed")?;
        }
    }

    let _ = INSTALLED.set(());
    tracing::debug!(version = crate::VERSION, "logging initialised");
    Ok(())
}
