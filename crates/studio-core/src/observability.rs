use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "studio.logs.jsonl";
const DEFAULT_FILTER: &str = "info";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `STUDIO_LOG_LEVEL` directive; falls back to `RUST_LOG`, then `info`.
    pub filter: Option<String>,
    /// JSONL output file. Console output on stderr when unset.
    pub json_path: Option<PathBuf>,
}

impl LogSettings {
    /// Reads:
    /// - `STUDIO_OBSERVABILITY_ENABLED` / `STUDIO_OBSERVABILITY`: on/off (default on)
    /// - `STUDIO_LOG_LEVEL`: filter directive (`info`, `studio_harness=debug`, ...)
    /// - `STUDIO_JSON_LOG_PATH`: JSONL file path
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["STUDIO_OBSERVABILITY_ENABLED", "STUDIO_OBSERVABILITY"]
            .iter()
            .find_map(|key| lookup(*key))
            .map(|raw| parse_bool_env(&raw).unwrap_or(true))
            .unwrap_or(true);
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            enabled,
            filter: non_blank("STUDIO_LOG_LEVEL"),
            json_path: non_blank("STUDIO_JSON_LOG_PATH").map(PathBuf::from),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn env_filter(&self) -> EnvFilter {
        self.filter
            .as_deref()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    }
}

pub(crate) fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Directory and file name for the appender; creates the directory.
pub(crate) fn log_file_target(path: &Path) -> (PathBuf, String) {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            let _ = std::fs::create_dir_all(parent);
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initializes logging from the environment, once per process.
///
/// Console logs go to stderr so they never interleave with answers streamed
/// to stdout.
pub fn init_observability() {
    init_with(&LogSettings::from_env());
}

/// Initializes logging from explicit settings. Later calls are no-ops.
pub fn init_with(settings: &LogSettings) {
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }
        let registry = tracing_subscriber::registry().with(settings.env_filter());
        let installed = match &settings.json_path {
            Some(path) => {
                let (dir, file_name) = log_file_target(path);
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_span_list(true)
                            .with_target(false)
                            .with_writer(tracing_appender::rolling::never(dir, file_name)),
                    )
                    .try_init()
            }
            None => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };
        if installed.is_ok() {
            debug!(
                event = "observability.init",
                json = settings.json_path.is_some(),
                "logging initialized"
            );
        }
    });
}
