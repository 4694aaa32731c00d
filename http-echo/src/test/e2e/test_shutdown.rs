use std::time::Duration;

use rama::{
    http::{BodyExtractExt as _, StatusCode, service::client::HttpClientExt as _},
    telemetry::tracing,
};
use tokio::net::TcpStream;

use http_echo_lib::{
    lifecycle::{EXIT_CODE_INTERRUPTED, Termination},
    utils::env::SERVICE_NAME,
};

use crate::test::e2e;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_interrupt_drains_in_flight_request() {
    let runtime = e2e::runtime::spawn_with_args(&["--text", "hello"]).await;
    let addr = runtime.socket_addr();
    let client = runtime.client();
    let url = runtime.url("/?response-delay=1500");

    let in_flight = tokio::spawn(async move {
        let resp = client.get(url).send().await.unwrap();
        let status = resp.status();
        (status, resp.try_into_string().await.unwrap())
    });

    // give the request time to reach the server
    tokio::time::sleep(Duration::from_millis(200)).await;

    let shutdown = tokio::spawn(runtime.interrupt());

    // listener is closed while the request above is still being delayed
    let mut refused = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if TcpStream::connect(addr.to_string()).await.is_err() {
            refused = true;
            break;
        }
    }
    assert!(refused, "new connections to {addr} still accepted during shutdown");
    assert!(!in_flight.is_finished());

    let termination = shutdown.await.unwrap().unwrap();
    let Termination::Interrupted { delay } = termination;
    assert!(delay < Duration::from_secs(5), "delay = {delay:?}");
    assert_eq!(EXIT_CODE_INTERRUPTED, termination.exit_code());

    let (status, payload) = in_flight.await.unwrap();
    assert_eq!(StatusCode::OK, status);
    assert_eq!("hello\n", payload);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_interrupt_after_deadline_is_an_error() {
    let runtime = e2e::runtime::spawn_with_args(&["--text", "hello"]).await;
    let client = runtime.client();
    let url = runtime.url("/?response-delay=60000");

    let _in_flight = tokio::spawn(async move {
        let _ = client.get(url).send().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = runtime.interrupt().await.unwrap_err();
    assert!(
        err.to_string().contains("failed to shutdown server"),
        "err = {err}"
    );
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_bind_failure_is_an_error() {
    // TEST-NET-1 address, never assigned to a local interface
    let result = e2e::runtime::run_to_completion(&[
        SERVICE_NAME,
        "--listen",
        "192.0.2.1:0",
        "--text",
        "hello",
    ])
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("bind"), "err = {err}");
}
