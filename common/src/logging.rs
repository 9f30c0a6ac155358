//! Structured logging initialization. One shared `log` facade is used
//! everywhere in the node — core logic never prints directly.

use std::io::Write;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// Per-module log level override, the way the teacher's `ModuleConfig`
/// narrows verbosity for a single noisy target without touching the global
/// level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub logs_dir: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            modules: Vec::new(),
            logs_dir: None,
        }
    }
}

/// Initializes the process-wide logger. One of the node's three long-lived
/// singletons (the other two are the chain client and the worker pool).
pub fn init(config: &LoggingConfig) {
    let default_level = config
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(default_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        });

    for module in &config.modules {
        if let Ok(level) = module.level.parse::<LevelFilter>() {
            builder.filter_module(&module.module, level);
        }
    }

    let _ = builder.try_init();
}
