// file: src/logging/logger.rs
// version: 2.0.0
// guid: 4a7f2c91-d3e8-4b06-9f15-e82c0b6d7a43

//! Logger initialization and configuration

use crate::{error::InstallError, Result};
use tracing::Instrument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither -v nor -q is given
const DEFAULT_LEVEL: &str = "info";

fn level_for(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        DEFAULT_LEVEL
    }
}

/// Initialize the human readable logger on stderr
pub fn init_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
        .map_err(|e| InstallError::ConfigError(format!("Failed to initialize logger: {}", e)))?;

    Ok(())
}

/// Initialize structured JSON logging, one event per line
pub fn init_json_logger(verbose: bool, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).json())
        .try_init()
        .map_err(|e| {
            InstallError::ConfigError(format!("Failed to initialize JSON logger: {}", e))
        })?;

    Ok(())
}

/// Run `fut` inside an `operation` span named `operation`
pub async fn with_async_operation_span<Fut, R>(operation: &str, fut: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    let span = tracing::info_span!("operation", name = operation);
    fut.instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(false, false), "info");
        assert_eq!(level_for(true, false), "debug");
        // quiet wins over verbose
        assert_eq!(level_for(true, true), "error");
    }

    #[test]
    fn test_init_logger_twice() {
        // Arrange
        let _ = init_logger(false, false);

        // Act
        let second = init_json_logger(false, false);

        // Assert
        // A global subscriber can only be installed once per process
        assert!(matches!(second, Err(InstallError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_with_async_operation_span() {
        // Act
        let result = with_async_operation_span("delayed_operation", async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            42
        })
        .await;

        // Assert
        assert_eq!(result, 42);
    }
}
