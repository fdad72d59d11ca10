//! The full stack wired together: config, adapter, logging decorator, server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use xhttp::core::{RequestSummary, WriteError};
use xhttp::prelude::*;

#[derive(Default)]
struct Summaries(Mutex<Vec<RequestSummary>>);

impl LogHook for Summaries {
    fn response_write_failed(&self, _ctx: &RequestContext, _error: &WriteError) {}

    fn request_completed(&self, summary: &RequestSummary) {
        self.0.lock().unwrap().push(summary.clone());
    }
}

#[derive(Serialize)]
struct Item {
    name: &'static str,
}

async fn items(_ctx: RequestContext, req: Request) -> Result<Option<Item>, HandlerError> {
    match req.uri().path() {
        "/items/1" => Ok(Some(Item { name: "lamp" })),
        "/items/oops" => Err(HandlerError::Other(std::io::Error::other("disk on fire").into())),
        _ => Err(Problem::bad_request([InvalidParam::new("id", "must be numeric")]).into()),
    }
}

async fn get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn test_config_to_running_stack() {
    let config = ConfigLoader::new()
        .with_string("[server]\nhttp_addr = \"127.0.0.1:0\"\nshutdown_timeout_secs = 1\n", "toml")
        .unwrap()
        .load()
        .unwrap();

    let hook = Arc::new(Summaries::default());
    let handler = LoggingHandler::new(HttpHandler::new(items)).with_log_hook(hook.clone());
    let bound = Server::new(config.server.to_server_config(), handler)
        .bind()
        .await
        .unwrap();
    let addr = bound.local_addr();

    let shutdown = ShutdownSignal::new();
    let task = tokio::spawn(bound.run_with_shutdown(shutdown.clone()));

    let ok = get(addr, "/items/1").await;
    assert!(ok.starts_with("HTTP/1.1 200 OK\r\n"), "{ok}");
    assert!(ok.ends_with("{\"name\":\"lamp\"}\n"));

    let invalid = get(addr, "/items/abc").await;
    assert!(invalid.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{invalid}");
    assert!(invalid.contains("\"invalid-params\":[{\"name\":\"id\",\"reason\":\"must be numeric\"}]"));

    let failed = get(addr, "/items/oops").await;
    assert!(failed.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{failed}");
    assert!(!failed.contains("disk on fire"));

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    let statuses: Vec<u16> = hook
        .0
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.status.as_u16())
        .collect();
    assert_eq!(statuses, vec![200, 400, 500]);
}
