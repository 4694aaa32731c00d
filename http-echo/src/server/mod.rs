use std::{path::Path, sync::Arc};

use rama::{
    Layer as _,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        HeaderName, HeaderValue,
        layer::{
            required_header::AddRequiredResponseHeadersLayer, set_header::SetResponseHeaderLayer,
            trace::TraceLayer,
        },
        server::HttpServer,
    },
    net::address::SocketAddress,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use http_echo_lib::{
    config::StartupConfig,
    http::EchoHttpServer,
    lifecycle::{ServerLifecycle, ServerState},
    policy::{RandomSource, SeededRandomSource, ThreadRandomSource},
    trace::{JsonLinesTraceSink, TraceSink, TracingTraceSink},
    utils::env::{SERVICE_NAME, app_version, server_identifier},
};

use crate::Args;

pub const HEADER_NAME_X_APP_NAME: HeaderName = HeaderName::from_static("x-app-name");
pub const HEADER_NAME_X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

pub async fn run_echo_server(
    args: Args,
    config: Arc<StartupConfig>,
    guard: ShutdownGuard,
    lifecycle: Arc<ServerLifecycle>,
) -> Result<(), BoxError> {
    let random: Arc<dyn RandomSource> = match args.seed {
        Some(seed) => {
            tracing::info!("rate gating uses a seeded random source: seed = {seed}");
            Arc::new(SeededRandomSource::new(seed))
        }
        None => Arc::new(ThreadRandomSource),
    };

    if config.trace_disabled() {
        tracing::info!("trace emission is disabled");
    }
    let trace_sink: Arc<dyn TraceSink> = if args.trace_log {
        Arc::new(TracingTraceSink)
    } else {
        Arc::new(JsonLinesTraceSink::stdout())
    };

    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
        SetResponseHeaderLayer::overriding(
            HEADER_NAME_X_APP_NAME,
            HeaderValue::from_static(SERVICE_NAME),
        ),
        SetResponseHeaderLayer::overriding(
            HEADER_NAME_X_APP_VERSION,
            HeaderValue::from_static(app_version()),
        ),
    )
        .into_layer(EchoHttpServer::new(config.clone(), random, trace_sink));

    let exec = Executor::graceful(guard);
    let http_server = HttpServer::auto(exec.clone()).service(Arc::new(http_svc));

    let tcp_listener = TcpListener::bind(config.listen_address().clone(), exec)
        .await
        .context("bind echo http server")?;

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for echo http server")?;

    if let Err(err) = lifecycle.advance(ServerState::Listening) {
        tracing::debug!("shutdown initiated prior to serving, stop echo http server: {err}");
        return Ok(());
    }
    tracing::info!("server is listening on {server_addr}");

    if let Some(dir) = args.data.as_deref() {
        write_server_socket_address_as_file(dir, SERVICE_NAME, server_addr.into()).await?;
    }

    tcp_listener.serve(http_server).await;

    Ok(())
}

async fn write_server_socket_address_as_file(
    dir: &Path,
    name: &str,
    addr: SocketAddress,
) -> Result<(), BoxError> {
    let path = dir.join(format!("{name}.addr.txt"));
    tokio::fs::write(&path, addr.to_string())
        .await
        .with_context(|| {
            format!(
                "write socket address '{addr}' for server '{name}' to file '{}'",
                path.display()
            )
        })
}
