#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, sync::Arc};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::{self, ShutdownGuard},
    net::socket::Interface,
    telemetry::tracing::{self, Instrument as _},
};

use clap::{Parser, error::ErrorKind};

use http_echo_lib::{
    config::{StartupConfig, StartupConfigError},
    lifecycle::{
        EXIT_CODE_FAILURE, EXIT_CODE_INVALID_ARGS, GRACEFUL_SHUTDOWN_TIMEOUT, ServerLifecycle,
        ServerState, ShutdownTrigger, Termination,
    },
    utils::{self, env::SERVICE_NAME, telemetry::TelemetryConfig},
};

pub mod server;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(test)]
pub mod test;

/// CLI arguments for configuring the echo server.
#[derive(Debug, Clone, Parser)]
#[command(name = "http-echo")]
#[command(bin_name = "http-echo")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// network interface to listen on, a missing host (e.g. `:5678`) binds to all IPv4 interfaces
    #[arg(
        long,
        short = 'l',
        value_name = "INTERFACE",
        default_value = ":5678",
        value_parser = parse_listen_interface,
    )]
    pub listen: Interface,

    /// text to put on the webpage
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// response code to return
    #[arg(long = "response-code", value_name = "CODE", default_value_t = 200)]
    pub response_code: u16,

    /// percentage of requests that get the response code and delay,
    /// all other requests get a 200 without delay
    #[arg(
        long = "response-rate",
        value_name = "PERCENTAGE",
        default_value_t = 100.,
        allow_negative_numbers = true
    )]
    pub response_rate: f64,

    /// delay each gated response by the given amount of milliseconds
    #[arg(
        long = "response-delay",
        value_name = "MILLISECONDS",
        default_value_t = 0.,
        allow_negative_numbers = true
    )]
    pub response_delay: f64,

    /// seed the random source used for rate gating, for reproducible runs
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// emit request traces as log events instead of JSON lines on stdout
    #[arg(long = "trace-log", default_value_t = false)]
    pub trace_log: bool,

    /// directory in which the bound socket address will be written to
    #[arg(long, short = 'D')]
    pub data: Option<PathBuf>,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(hide = true)]
    pub unexpected: Vec<String>,
}

impl Args {
    pub fn startup_config(&self, trace_disabled: bool) -> Result<StartupConfig, StartupConfigError> {
        let text = self.text.clone().unwrap_or_default();
        if text.is_empty() {
            return Err(StartupConfigError::MissingText);
        }
        if !self.unexpected.is_empty() {
            return Err(StartupConfigError::UnexpectedArguments(
                self.unexpected.clone(),
            ));
        }

        Ok(StartupConfig::try_new(
            self.listen.clone(),
            text,
            self.response_code,
            self.response_rate,
            self.response_delay,
        )?
        .with_trace_disabled(trace_disabled))
    }
}

fn parse_listen_interface(s: &str) -> Result<Interface, BoxError> {
    let s = s.trim();
    if s.starts_with(':') {
        format!("0.0.0.0{s}").parse().map_err(Into::into)
    } else {
        s.parse().map_err(Into::into)
    }
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                std::process::exit(EXIT_CODE_INVALID_ARGS);
            }
        },
    };

    let config = match args.startup_config(false) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🚩 {err}");
            std::process::exit(EXIT_CODE_INVALID_ARGS);
        }
    };

    if let Err(err) = utils::telemetry::init_tracing(TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    }) {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(EXIT_CODE_FAILURE);
    }

    let config = match utils::env::trace_disabled_from_env() {
        Ok(trace_disabled) => config.with_trace_disabled(trace_disabled),
        Err(err) => {
            tracing::error!("{err}");
            std::process::exit(EXIT_CODE_FAILURE);
        }
    };

    let base_shutdown_signal = graceful::default_signal();
    let exit_code = match run_with_args(base_shutdown_signal, args, config).await {
        Ok(termination) => termination.exit_code(),
        Err(err) => {
            eprintln!("🚩 exit with error: {err}");
            EXIT_CODE_FAILURE
        }
    };

    std::process::exit(exit_code);
}

/// Runs the echo server and blocks until a fatal error occurs
/// or the graceful shutdown, triggered by the given signal, finished.
///
/// This entry point is used by both the (binary) `main` function as well as
/// for the e2e test suite found in the test module.
async fn run_with_args<F>(
    base_shutdown_signal: F,
    args: Args,
    config: StartupConfig,
) -> Result<Termination, BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    if let Some(data) = args.data.as_deref() {
        tokio::fs::create_dir_all(data)
            .await
            .with_context(|| format!("create data directory at path '{}'", data.display()))?;
    }

    let config = Arc::new(config);
    let lifecycle = Arc::new(ServerLifecycle::new());

    let (error_tx, error_rx) = tokio::sync::mpsc::channel::<BoxError>(1);
    let (trigger_tx, trigger_rx) = tokio::sync::oneshot::channel::<ShutdownTrigger>();
    let graceful = graceful::Shutdown::new(new_shutdown_signal(
        error_rx,
        base_shutdown_signal,
        trigger_tx,
        lifecycle.clone(),
    ));

    graceful.spawn_task_fn({
        let lifecycle = lifecycle.clone();
        move |guard| run_echo_server(args, config, guard, error_tx, lifecycle)
    });

    let shutdown_result = graceful.shutdown_with_limit(GRACEFUL_SHUTDOWN_TIMEOUT).await;

    if let Err(err) = lifecycle.advance(ServerState::Terminated) {
        tracing::debug!("{err}");
    }

    let trigger = trigger_rx.await.context("receive shutdown trigger")?;
    match (trigger, shutdown_result) {
        (ShutdownTrigger::Fatal(err), _) => Err(err),
        (ShutdownTrigger::Interrupt, Ok(delay)) => {
            tracing::info!("gracefully shutdown with a delay of: {delay:?}");
            Ok(Termination::Interrupted { delay })
        }
        (ShutdownTrigger::Interrupt, Err(err)) => Err(BoxError::from(format!(
            "failed to shutdown server within {GRACEFUL_SHUTDOWN_TIMEOUT:?}: {err}"
        ))),
    }
}

async fn run_echo_server(
    args: Args,
    config: Arc<StartupConfig>,
    guard: ShutdownGuard,
    error_tx: tokio::sync::mpsc::Sender<BoxError>,
    lifecycle: Arc<ServerLifecycle>,
) {
    tracing::info!("spawning echo http server...");
    if let Err(err) = server::run_echo_server(args, config, guard, lifecycle)
        .instrument(tracing::debug_span!(
            "echo server lifetime",
            server.service.name = SERVICE_NAME,
            otel.kind = "server",
            network.protocol.name = "http",
        ))
        .await
    {
        tracing::error!("echo server exited with an error: {err}");
        let _ = error_tx.send(err).await;
    }
}

fn new_shutdown_signal(
    error_rx: tokio::sync::mpsc::Receiver<BoxError>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
    trigger_tx: tokio::sync::oneshot::Sender<ShutdownTrigger>,
    lifecycle: Arc<ServerLifecycle>,
) -> impl Future + Send + 'static {
    async move {
        let mut mut_error_rx = error_rx;
        let mut signal = Box::pin(base_shutdown_signal);

        let trigger = tokio::select! {
            _ = signal.as_mut() => {
                tracing::info!("received interrupt, shutting down...");
                ShutdownTrigger::Interrupt
            }
            err = mut_error_rx.recv() => {
                if let Some(err) = err {
                    tracing::error!("fatal err received: {err}; abort");
                    ShutdownTrigger::Fatal(err)
                } else {
                    tracing::info!("wait for default signal, no error was received");
                    signal.await;
                    tracing::info!("received interrupt, shutting down...");
                    ShutdownTrigger::Interrupt
                }
            }
        };

        if let Err(err) = lifecycle.advance(ServerState::ShuttingDown) {
            tracing::debug!("{err}");
        }
        let _ = trigger_tx.send(trigger);
    }
}
