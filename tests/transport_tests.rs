use std::time::Duration;

use neostat::{exchange, probe, Error, HubTarget, Reply};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct HubOutcome {
    received: Vec<u8>,
    saw_close: bool,
}

/// One-connection hub stand-in: reads a request frame (up to `\r`), writes
/// `response`, then reads again to observe the client closing its end.
async fn one_shot_hub(response: Vec<u8>) -> (HubTarget, JoinHandle<HubOutcome>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    received.extend_from_slice(&chunk[..n]);
                    if received.contains(&b'\r') {
                        break;
                    }
                }
            }
        }
        if !response.is_empty() {
            stream.write_all(&response).await.unwrap();
        }
        let saw_close = matches!(stream.read(&mut chunk).await, Ok(0));
        HubOutcome { received, saw_close }
    });
    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
    (target, handle)
}

#[tokio::test]
async fn probe_connects_without_writing() {
    let (target, hub) = one_shot_hub(Vec::new()).await;
    assert!(probe(&target).await);
    let outcome = hub.await.unwrap();
    assert!(outcome.received.is_empty(), "probe must not write any bytes");
    assert!(outcome.saw_close);
}

#[tokio::test]
async fn exchange_none_returns_online() {
    let (target, _hub) = one_shot_hub(Vec::new()).await;
    let reply = exchange(&target, None).await.unwrap();
    assert_eq!(reply, Reply::Online);
}

#[tokio::test]
async fn connect_refused_is_offline() {
    // Bind then drop to get a port nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Offline);
    assert!(!probe(&target).await);
}

#[tokio::test]
async fn newline_terminated_response() {
    let (target, hub) = one_shot_hub(b"{\"result\":\"ok\"}\n".to_vec()).await;
    let request = json!({"FROST_ON": "Kitchen"});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));

    let outcome = hub.await.unwrap();
    assert!(outcome.saw_close, "client must close after a valid response");
    // request frame ends with the NUL + CR terminator
    assert!(outcome.received.ends_with(b"\0\r"));
    let text = std::str::from_utf8(&outcome.received).unwrap();
    assert!(text.starts_with("{\"FROST_ON\":\"Kitchen\"}"));
}

#[tokio::test]
async fn close_terminated_response_without_newline() {
    let (target, _hub) = one_shot_hub(b"{\"result\":\"ok\"}".to_vec()).await;
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));
}

#[tokio::test]
async fn trailing_nuls_are_stripped() {
    let (target, _hub) = one_shot_hub(b"{\"result\":\"ok\"}\0\0\n".to_vec()).await;
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));
}

#[tokio::test]
async fn garbage_after_newline_is_ignored() {
    let (target, _hub) = one_shot_hub(b"{\"result\":\"ok\"}\n{\"result\":\"no\"}".to_vec()).await;
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));
}

#[tokio::test]
async fn malformed_json_is_an_error_not_offline() {
    let (target, hub) = one_shot_hub(b"not json at all\n".to_vec()).await;
    let request = json!({"INFO": 0});
    let err = exchange(&target, Some(&request)).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)), "got {err:?}");
    let outcome = hub.await.unwrap();
    assert!(outcome.saw_close, "client must close after a parse failure");
}

#[tokio::test]
async fn zero_byte_response_is_a_parse_failure() {
    // Hub reads the request then closes without answering.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut chunk = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.contains(&b'\r') {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&chunk[..n]),
            }
        }
    });

    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
    let request = json!({"INFO": 0});
    let err = exchange(&target, Some(&request)).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)), "got {err:?}");
}

#[tokio::test]
async fn nonstrict_tokens_decode_as_null() {
    let (target, _hub) = one_shot_hub(b"{\"HUMIDITY\": NaN, \"OK\": 1}\n".to_vec()).await;
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    let Reply::Payload(payload) = reply else {
        panic!("expected payload, got {reply:?}");
    };
    assert!(payload["HUMIDITY"].is_null());
    assert_eq!(payload["OK"], 1);
}

#[tokio::test]
async fn silent_hub_times_out_as_offline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let hub = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // Read the request but never answer; hold the socket open until the
        // client gives up.
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break true,
                Ok(_) => {}
            }
        }
    });

    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(150));
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Offline);
    assert!(hub.await.unwrap(), "client must close after a read timeout");
}

#[tokio::test]
async fn idle_after_partial_data_uses_buffer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut chunk = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.contains(&b'\r') {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&chunk[..n]),
            }
        }
        // Answer without a newline and go idle instead of closing.
        stream.write_all(b"{\"result\":\"ok\"}").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(150));
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));
}

#[tokio::test]
async fn chunked_response_is_reassembled() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut chunk = [0u8; 4096];
        let mut seen = Vec::new();
        while !seen.contains(&b'\r') {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&chunk[..n]),
            }
        }
        stream.write_all(b"{\"result\":").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream.write_all(b"\"ok\"}\n").await.unwrap();
    });

    let target = HubTarget::new("127.0.0.1", port).with_timeout(Duration::from_millis(500));
    let request = json!({"INFO": 0});
    let reply = exchange(&target, Some(&request)).await.unwrap();
    assert_eq!(reply, Reply::Payload(json!({"result": "ok"})));
}
