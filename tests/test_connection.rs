use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wicket::http::connection::{Connection, ConnectionSettings};
use wicket::http::request::Method;
use wicket::server::Router;

fn test_router() -> Router {
    let mut router = Router::new();
    router
        .handle_fn("/hi", |w, _req| {
            w.header().set("Content-Length", "3");
            w.write(b"hi!")?;
            Ok(())
        })
        .unwrap();
    router
        .handle_fn("/echo", |w, req| {
            if req.method != Method::POST {
                w.header().set("Content-Length", "0");
                w.write_header(405)?;
                return Ok(());
            }
            w.header().set("Content-Length", req.body.len().to_string());
            w.write(&req.body)?;
            Ok(())
        })
        .unwrap();
    router
        .handle_fn("/stream", |w, _req| {
            w.write(b"part one, ")?;
            w.write(b"part two")?;
            Ok(())
        })
        .unwrap();
    router
        .handle_fn("/bye", |w, _req| {
            w.header().set("Connection", "close");
            w.header().set("Content-Length", "3");
            w.write(b"bye")?;
            Ok(())
        })
        .unwrap();
    router
        .handle_fn("/fail", |_w, _req| anyhow::bail!("database unavailable"))
        .unwrap();
    router
        .handle_fn("/half", |w, _req| {
            w.write(b"part one")?;
            anyhow::bail!("upstream went away")
        })
        .unwrap();
    router
        .handle_fn("/short", |w, _req| {
            w.header().set("Content-Length", "10");
            w.write(b"abc")?;
            Ok(())
        })
        .unwrap();
    router
}

fn spawn_connection(settings: ConnectionSettings) -> (DuplexStream, JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let router = Arc::new(test_router());
    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, router, settings);
        conn.run().await
    });
    (client, task)
}

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        read_timeout: Duration::from_millis(200),
        max_request_bytes: 8 * 1024,
    }
}

/// Reads one Content-Length framed response.
async fn read_response(client: &mut DuplexStream) -> String {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    while !raw.ends_with(b"\r\n\r\n") {
        let n = client.read(&mut byte).await.unwrap();
        assert!(n > 0, "connection closed inside header block: {raw:?}");
        raw.push(byte[0]);
    }

    let head = String::from_utf8(raw.clone()).unwrap();
    let length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length: "))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0);

    let mut body = vec![0u8; length];
    client.read_exact(&mut body).await.unwrap();
    raw.extend_from_slice(&body);
    String::from_utf8(raw).unwrap()
}

async fn read_until_closed(client: &mut DuplexStream) -> String {
    let mut raw = Vec::new();
    timeout(Duration::from_secs(2), client.read_to_end(&mut raw))
        .await
        .expect("server should close the connection")
        .unwrap();
    String::from_utf8(raw).unwrap()
}

#[tokio::test]
async fn test_http11_serves_multiple_turns() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /hi HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let first = read_response(&mut client).await;
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"), "{first:?}");
    assert!(first.ends_with("\r\n\r\nhi!"));

    client
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 4\r\n\r\nping")
        .await
        .unwrap();
    let second = read_response(&mut client).await;
    assert!(second.ends_with("\r\n\r\nping"), "{second:?}");

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let (mut client, task) = spawn_connection(settings());

    for piece in [&b"POST /ec"[..], b"ho HTTP/1.1\r\nConte", b"nt-Length: 5\r\n\r\nHel", b"lo"] {
        client.write_all(piece).await.unwrap();
        client.flush().await.unwrap();
        tokio::task::yield_now().await;
    }

    let response = read_response(&mut client).await;
    assert!(response.ends_with("\r\n\r\nHello"), "{response:?}");

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_back_to_back_requests_in_one_write() {
    let (mut client, task) = spawn_connection(settings());

    client
        .write_all(b"GET /hi HTTP/1.1\r\n\r\nPOST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nok")
        .await
        .unwrap();

    assert!(read_response(&mut client).await.ends_with("hi!"));
    assert!(read_response(&mut client).await.ends_with("\r\n\r\nok"));

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http10_closes_after_one_turn() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /hi HTTP/1.0\r\n\r\n").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"), "{response:?}");
    assert!(response.contains("connection: close\r\n"));
    assert!(response.ends_with("hi!"));
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http10_keep_alive_allows_second_turn() {
    let (mut client, task) = spawn_connection(settings());

    client
        .write_all(b"GET /hi HTTP/1.0\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();
    let first = read_response(&mut client).await;
    assert!(first.contains("connection: keep-alive\r\n"), "{first:?}");

    client.write_all(b"GET /hi HTTP/1.0\r\n\r\n").await.unwrap();
    let rest = read_until_closed(&mut client).await;
    assert!(rest.starts_with("HTTP/1.0 200 OK\r\n"));
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http11_client_close() {
    let (mut client, task) = spawn_connection(settings());

    client
        .write_all(b"GET /hi HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.ends_with("hi!"));
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http11_handler_close() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /bye HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.contains("connection: close\r\n"));
    assert!(response.ends_with("bye"));
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_target_gets_404_and_stays_open() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /missing HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_response(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response:?}");

    client.write_all(b"GET /hi HTTP/1.1\r\n\r\n").await.unwrap();
    assert!(read_response(&mut client).await.ends_with("hi!"));

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handler_status_reaches_client() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /echo HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_response(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

    drop(client);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_chunked_response_on_the_wire() {
    let (mut client, task) = spawn_connection(settings());

    client
        .write_all(b"GET /stream HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.contains("transfer-encoding: chunked\r\n"));
    assert!(response.ends_with("\r\n\r\na\r\npart one, \r\n8\r\npart two\r\n0\r\n\r\n"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_close() {
    for raw in [
        &b"NOMETHOD / HTTP/1.1\r\n\r\n"[..],
        b"GET /HTTP/1.1\r\n\r\n",
        b"GET / HTTP/0.1\r\n\r\n",
        b"GET / HTTP/1.1\r\nno colon here\r\n\r\n",
        b"POST /echo HTTP/1.1\r\nContent-Length: nope\r\n\r\n",
        b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n",
        b"PUT / HTTP/1.1\r\n\r\n",
    ] {
        let (mut client, task) = spawn_connection(settings());
        client.write_all(raw).await.unwrap();

        let response = read_until_closed(&mut client).await;
        assert!(
            response.starts_with("HTTP/1.1 400 Bad Request\r\n"),
            "{raw:?} -> {response:?}"
        );
        assert!(response.contains("connection: close\r\n"));
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_oversized_request_is_refused() {
    let (mut client, task) = spawn_connection(ConnectionSettings {
        read_timeout: Duration::from_millis(200),
        max_request_bytes: 64,
    });

    let raw = format!("GET /hi HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "a".repeat(200));
    client.write_all(raw.as_bytes()).await.unwrap();

    let response = read_until_closed(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handler_error_becomes_500() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /fail HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_handler_error_mid_body_leaves_body_unterminated() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /half HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response:?}");
    assert!(response.ends_with("\r\n\r\n8\r\npart one\r\n"), "{response:?}");
    assert!(!response.ends_with("0\r\n\r\n"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http10_rejection_answers_in_http10() {
    for raw in [
        &b"GET / HTTP/1.0\r\nno colon here\r\n\r\n"[..],
        b"POST /echo HTTP/1.0\r\nContent-Length: nope\r\n\r\n",
    ] {
        let (mut client, task) = spawn_connection(settings());
        client.write_all(raw).await.unwrap();

        let response = read_until_closed(&mut client).await;
        assert!(
            response.starts_with("HTTP/1.0 400 Bad Request\r\n"),
            "{raw:?} -> {response:?}"
        );
        assert!(response.contains("connection: close\r\n"));
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_unknown_version_rejection_answers_in_http11() {
    let (mut client, task) = spawn_connection(settings());
    client.write_all(b"GET / HTTP/0.9\r\n\r\n").await.unwrap();

    let response = read_until_closed(&mut client).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_short_body_closes_connection() {
    let (mut client, task) = spawn_connection(settings());

    client.write_all(b"GET /short HTTP/1.1\r\n\r\n").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.ends_with("\r\n\r\nabc"), "{response:?}");
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_idle_client_is_dropped_after_deadline() {
    let (mut client, task) = spawn_connection(ConnectionSettings {
        read_timeout: Duration::from_millis(50),
        max_request_bytes: 1024,
    });

    client.write_all(b"GET /hi HTT").await.unwrap();
    let response = read_until_closed(&mut client).await;

    assert!(response.is_empty());
    task.await.unwrap().unwrap();
}
