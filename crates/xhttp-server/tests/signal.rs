//! Shutdown driven by a real SIGTERM delivered to the test process.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{raise, Signal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use xhttp_core::handler_fn;
use xhttp_server::{Server, ServerConfig, ServerState};

#[tokio::test]
async fn test_sigterm_drains_in_flight_request_and_stops() {
    // Registering a listener first replaces the default disposition, so an
    // early SIGTERM cannot kill the test process.
    let _sigterm = signal(SignalKind::terminate()).unwrap();

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let handler = handler_fn({
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        move |_ctx, _req, sink| {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            Box::pin(async move {
                started.notify_one();
                release.notified().await;
                let _ = sink.write(b"finished");
            })
        }
    });

    let config = ServerConfig::builder()
        .http_addr("127.0.0.1:0")
        .shutdown_timeout(Duration::from_secs(5))
        .build();
    let bound = Server::new(config, handler).bind().await.unwrap();
    let addr = bound.local_addr();
    let mut state = bound.state();
    assert_eq!(*state.borrow(), ServerState::Running);

    let server = tokio::spawn(bound.run_until_signal_or_error());

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /report HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    });
    started.notified().await;

    // The server registers its own handler when it starts running; repeat
    // the signal until it has been observed.
    let mut draining = false;
    for _ in 0..100 {
        raise(Signal::SIGTERM).unwrap();
        let observed = tokio::time::timeout(
            Duration::from_millis(50),
            state.wait_for(|state| *state == ServerState::Draining),
        )
        .await
        .is_ok_and(|changed| changed.is_ok());
        if observed {
            draining = true;
            break;
        }
    }
    assert!(draining, "server never started draining after SIGTERM");

    release.notify_one();
    let response = client.await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.ends_with("finished"), "{response}");

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop")
        .expect("server task should not panic");
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(*state.borrow(), ServerState::Stopped);
}
