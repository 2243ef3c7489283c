//! Command-line arguments and run settings

use clap::Parser;
use queuewatch_core::{ConfigError, Target, WatchdogConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "queuewatch")]
#[command(about = "Sample engine queue depth on every target while driving load, then check it stays bounded")]
pub struct Args {
    /// Target to watch, as name=url (repeatable)
    #[arg(long = "target", short = 't', value_name = "NAME=URL")]
    pub targets: Vec<Target>,

    /// JSON file with targets and watchdog settings
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Largest allowed queue depth
    #[arg(long)]
    pub max_depth: Option<u64>,

    /// Blocks to advance per target
    #[arg(long)]
    pub units: Option<u64>,

    /// Polling attempts before the load gives up
    #[arg(long)]
    pub ceiling: Option<u64>,

    /// Overall deadline for the load, e.g. "5m"
    #[arg(long, value_parser = humantime_duration)]
    pub run_timeout: Option<Duration>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Contents of a `--config` file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub targets: Vec<Target>,
    pub watchdog: WatchdogConfig,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Merge command-line flags over the file settings and validate.
    ///
    /// Targets given on the command line are added after the file's targets.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut settings = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        settings.targets.extend(args.targets.iter().cloned());
        if let Some(max_depth) = args.max_depth {
            settings.watchdog.max_queue_depth = max_depth;
        }
        if let Some(units) = args.units {
            settings.watchdog.units_requested = units;
        }
        if let Some(ceiling) = args.ceiling {
            settings.watchdog.units_ceiling = ceiling;
        }
        if let Some(run_timeout) = args.run_timeout {
            settings.watchdog.run_timeout = run_timeout;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid {
                field: "targets",
                reason: "at least one target is required".into(),
            });
        }

        let mut keys: Vec<_> = self.targets.iter().map(Target::key).collect();
        keys.sort_unstable();
        if let Some(pair) = keys.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::Invalid {
                field: "targets",
                reason: format!("duplicate target '{}'", pair[0]),
            });
        }

        self.watchdog.validate()
    }
}

fn humantime_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
