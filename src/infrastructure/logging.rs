//! Tracing subscriber setup for the binary.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "mathpad=info";

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// The terminal UI owns the screen; without a log file nothing is logged.
    Disabled,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(target: LogTarget) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter()).with_target(false);

    match target {
        LogTarget::Stderr => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| anyhow::anyhow!("{}", err))?,
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| anyhow::anyhow!("{}", err))?
        }
        LogTarget::Disabled => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_installs_nothing() {
        assert!(init_logging(LogTarget::Disabled).is_ok());
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let result = init_logging(LogTarget::File(PathBuf::from("/nonexistent/dir/mathpad.log")));
        assert!(result.is_err());
    }
}
