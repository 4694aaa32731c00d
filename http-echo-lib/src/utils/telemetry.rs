use std::{io::IsTerminal as _, path::Path};

use rama::{
    error::{BoxError, ErrorContext as _},
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
    },
};

use super::env::{SERVICE_NAME, app_version};

#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryConfig<'a> {
    pub verbose: bool,
    pub pretty: bool,
    pub output: Option<&'a Path>,
}

impl TelemetryConfig<'_> {
    fn default_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    // escape codes only end up on an interactive stderr
    fn use_ansi(&self) -> bool {
        self.output.is_none() && std::io::stderr().is_terminal()
    }
}

/// Install the global log subscriber of the echo server.
///
/// `RUST_LOG` takes precedence over the level picked by `verbose`.
/// Request traces are not part of this output unless `--trace-log` is used.
pub fn init_tracing(cfg: TelemetryConfig<'_>) -> Result<(), BoxError> {
    let filter = EnvFilter::builder()
        .with_default_directive(cfg.default_level().into())
        .from_env_lossy();

    let builder = tracing::subscriber::fmt()
        .with_ansi(cfg.use_ansi())
        .with_env_filter(filter)
        .with_writer(log_writer(cfg.output)?);

    if cfg.pretty {
        builder.pretty().try_init()?;
    } else {
        builder.try_init()?;
    }

    tracing::info!(
        "{SERVICE_NAME} {} logging at {} (or RUST_LOG)",
        app_version(),
        cfg.default_level()
    );
    Ok(())
}

/// Log lines are appended to `output` when given, written to stderr otherwise.
fn log_writer(output: Option<&Path>) -> Result<BoxMakeWriter, BoxError> {
    let Some(path) = output else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("open {SERVICE_NAME} log file '{}'", path.display()))?;
    Ok(BoxMakeWriter::new(file))
}
