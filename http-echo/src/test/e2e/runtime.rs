use std::{io::ErrorKind, path::PathBuf, time::Duration};

use clap::Parser;
use rama::{
    Layer as _, Service,
    error::BoxError,
    http::{
        Request, Response, client::EasyHttpWebClient,
        layer::map_request_body::MapRequestBodyLayer,
    },
    layer::TimeoutLayer,
    net::address::SocketAddress,
    rt::Executor,
};
use tokio::{sync::oneshot, task::JoinHandle};

use http_echo_lib::{lifecycle::Termination, utils::env::SERVICE_NAME};

use crate::Args;

pub(super) struct Runtime {
    addr: SocketAddress,
    interrupt_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<Termination, BoxError>>,
}

impl Runtime {
    #[inline(always)]
    pub fn socket_addr(&self) -> SocketAddress {
        self.addr
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }

    #[inline(always)]
    pub fn client(&self) -> impl Service<Request, Output = Response, Error = BoxError> {
        create_client()
    }

    /// Send the interrupt signal and wait until the server terminated.
    pub async fn interrupt(self) -> Result<Termination, BoxError> {
        let _ = self.interrupt_tx.send(());
        tokio::time::timeout(Duration::from_secs(30), self.handle)
            .await
            .expect("server to terminate in time")
            .expect("server task not to panic")
    }
}

fn create_client() -> impl Service<Request, Output = Response, Error = BoxError> {
    let inner_client = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(None)
        .with_default_http_connector(Executor::default())
        .try_with_default_connection_pool()
        .expect("create connection pool for echo web client")
        .build_client();

    (
        TimeoutLayer::new(Duration::from_secs(60)),
        MapRequestBodyLayer::new_boxed_streaming_body(),
    )
        .into_layer(inner_client)
}

/// Spawn an echo server on a random loopback port,
/// with the given arguments added to the defaults.
///
/// Trace emission is disabled, use [`spawn_traced_with_args`] to enable it.
pub(super) async fn spawn_with_args(extra_args: &[&str]) -> Runtime {
    spawn_inner(extra_args, true).await
}

pub(super) async fn spawn_traced_with_args(extra_args: &[&str]) -> Runtime {
    spawn_inner(extra_args, false).await
}

async fn spawn_inner(extra_args: &[&str], trace_disabled: bool) -> Runtime {
    let data_dir = crate::test::tmp_dir::try_new("http_echo_e2e").unwrap();
    eprintln!("http_echo_e2e data stored under: {data_dir:?}");

    let data_dir_str = data_dir.display().to_string();
    let mut argv: Vec<&str> = vec![
        SERVICE_NAME,
        "--listen",
        "127.0.0.1:0",
        "--data",
        data_dir_str.as_str(),
    ];
    argv.extend(extra_args);

    let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();
    let handle = spawn_with_argv(&argv, trace_disabled, async move {
        let _ = interrupt_rx.await;
    });

    let addr = tokio::time::timeout(
        Duration::from_secs(30),
        read_file_or_wait(data_dir.join(format!("{SERVICE_NAME}.addr.txt"))),
    )
    .await
    .unwrap();

    Runtime {
        addr,
        interrupt_tx,
        handle,
    }
}

/// Run the echo server with the full argv until it terminates,
/// never interrupting it.
pub(super) async fn run_to_completion(argv: &[&str]) -> Result<Termination, BoxError> {
    tokio::time::timeout(
        Duration::from_secs(30),
        spawn_with_argv(argv, true, std::future::pending::<()>()),
    )
    .await
    .expect("server to terminate in time")
    .expect("server task not to panic")
}

fn spawn_with_argv<F>(
    argv: &[&str],
    trace_disabled: bool,
    signal: F,
) -> JoinHandle<Result<Termination, BoxError>>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let args = Args::try_parse_from(argv).unwrap();
    let config = args.startup_config(trace_disabled).unwrap();
    tokio::spawn(crate::run_with_args(signal, args, config))
}

async fn read_file_or_wait(path: PathBuf) -> SocketAddress {
    loop {
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => {
                let s = s.trim();
                if s.is_empty() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                match s.parse() {
                    Ok(addr) => return addr,
                    Err(err) => {
                        eprintln!("unexpected error parsing socket addr (content={s:?}): {err}");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                }
            }
            Err(err) => {
                if err.kind() == ErrorKind::NotFound {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                } else {
                    panic!("unexpected error: {err}");
                }
            }
        }
    }
}
