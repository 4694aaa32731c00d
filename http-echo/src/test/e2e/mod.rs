#![allow(unused)]

use rama::telemetry::tracing;

mod runtime;

mod test_shutdown;
mod test_trace;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_runtime_spawn() {
    // ensure that spawning and interrupting a server works,
    // outside of any other things that might otherwise go wrong

    let runtime = self::runtime::spawn_with_args(&["--text", "hello"]).await;
    assert!(runtime.socket_addr().ip_addr.is_loopback());
    assert_ne!(0, runtime.socket_addr().port);

    let termination = runtime.interrupt().await.unwrap();
    assert_eq!(2, termination.exit_code());
}
