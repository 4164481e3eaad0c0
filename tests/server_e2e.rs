//! End-to-end tests over real TCP sockets.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use kresnik::config::Config;
use kresnik::db::{MemoryStorage, SharedStorage};
use kresnik::net::{Server, ServerHandle};
use kresnik::protocol::PUBLIC_KEY_HEADER;
use kresnik::router::{ParamKind, Route};
use kresnik::secure::cipher::{decrypt, encrypt};
use kresnik::secure::{dh, SessionKey};

fn test_config(secure: bool) -> Config {
    let mut cfg = Config::default();
    cfg.server.host = "127.0.0.1".into();
    cfg.server.port = 0;
    cfg.server.secure = secure;
    // generous read timeout so slow CI runners do not cut requests short
    cfg.limits.read_timeout_ms = 200;
    cfg
}

fn echo_route() -> Route {
    Route::post("/echo", |_ctx, args| {
        Ok(json!({
            "title": args.str("title")?,
            "tag": args.str("tag")?,
            "count": args.get("count").cloned().unwrap_or(Value::Null),
        }))
    })
    .param("title", ParamKind::Str)
    .param("tag", ParamKind::Str)
    .optional("count", ParamKind::Int)
}

async fn start(cfg: Config, routes: Vec<Route>) -> (SocketAddr, ServerHandle, JoinHandle<()>) {
    let db = SharedStorage::new(MemoryStorage::new());
    let mut server = Server::new(Arc::new(cfg), db);
    for route in routes {
        server.register(route);
    }
    let running = server.bind().expect("bind failed");
    let addr = running.local_addr().expect("no local addr");
    let handle = running.handle();
    let task = tokio::spawn(running.serve());
    (addr, handle, task)
}

/// Send one raw request frame and collect the complete response.
async fn exchange(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(raw.as_bytes()).await.expect("write failed");
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("read failed");
    String::from_utf8(buf).expect("response is not utf-8")
}

fn build_request(method: &str, target: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut lines = vec![format!("{} {} HTTP/1.1", method, target)];
    for (k, v) in headers {
        lines.push(format!("{}: {}", k, v));
    }
    lines.push(String::new());
    lines.push(body.to_string());
    let mut raw = lines.join("\r\n");
    raw.push_str("\r\n\r\n");
    raw
}

/// Split a response into status code and body text.
fn split_response(wire: &str) -> (u16, String) {
    let (head, body) = wire.split_once("\r\n\r\n").expect("no header terminator");
    let status_line = head.lines().next().expect("no status line");
    let status: u16 = status_line
        .split(' ')
        .nth(1)
        .expect("no status code")
        .parse()
        .expect("status is not a number");
    (status, body.to_string())
}

fn json_body(wire: &str) -> (u16, Value) {
    let (status, body) = split_response(wire);
    (status, serde_json::from_str(&body).expect("body is not json"))
}

#[tokio::test]
async fn post_json_endpoint_round_trip() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let body = json!({"title": "Cacdila 10v", "tag": "fast", "count": 3});
    let raw = build_request(
        "POST",
        "/echo",
        &[("Content-Type", "application/json")],
        &body.to_string(),
    );
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);

    assert_eq!(status, 200);
    assert_eq!(value["ok"], json!(true));
    assert_eq!(value["data"]["title"], json!("Cacdila 10v"));
    assert_eq!(value["data"]["count"], json!(3));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn optional_parameter_may_be_absent() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let body = json!({"title": "t", "tag": "g"});
    let raw = build_request(
        "POST",
        "/echo",
        &[("Content-Type", "application/json")],
        &body.to_string(),
    );
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);

    assert_eq!(status, 200);
    assert_eq!(value["data"]["count"], json!(null));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn get_endpoint_reads_query_parameters() {
    let route = Route::get("/chat", |_ctx, args| {
        Ok(json!({ "car_id": args.i64("car_id")? }))
    })
    .param("car_id", ParamKind::Int);
    let (addr, handle, task) = start(test_config(false), vec![route]).await;

    let raw = build_request("GET", "/chat?car_id=12", &[], "");
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 200);
    assert_eq!(value["data"]["car_id"], json!(12));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let raw = build_request("POST", "/nope", &[], "");
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 404);
    assert_eq!(value["error"], json!("NotFound"));
    assert_eq!(value["ok"], json!(false));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn wrong_method_is_405() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let raw = build_request("GET", "/echo", &[], "");
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 405);
    assert_eq!(value["error"], json!("MethodNotAllowed"));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn missing_parameters_are_reported_together() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let raw = build_request(
        "POST",
        "/echo",
        &[("Content-Type", "application/json")],
        "{}",
    );
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 400);
    assert_eq!(value["error"], json!("MissingParameters"));
    let msg = value["message"].as_str().unwrap();
    assert!(msg.contains("title"));
    assert!(msg.contains("tag"));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn malformed_request_is_400() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    let (status, value) = json_body(&exchange(addr, "BREW /pot HTTP/1.1\r\n\r\n").await);
    assert_eq!(status, 400);
    assert_eq!(value["error"], json!("MalformedRequest"));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn full_secure_session() {
    let (addr, handle, task) = start(test_config(true), vec![echo_route()]).await;

    // handshake: send our public value, receive the server's
    let client_private = 123_456_789_012_345;
    let client_public = dh::public_key(client_private);
    let pk_header = client_public.to_string();

    let raw = build_request(
        "POST",
        "/handshake",
        &[(PUBLIC_KEY_HEADER, pk_header.as_str())],
        "",
    );
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 200);
    assert_eq!(value["ok"], json!(true));
    let server_pk = value["data"]["server_pk"].as_u64().expect("no server_pk");

    // derive the same session key the server stored
    let key = SessionKey::derive(dh::shared_secret(server_pk, client_private));

    // encrypted request, encrypted response
    let payload = json!({"title": "Cacdila 10v", "tag": "fast", "count": 3}).to_string();
    let raw = build_request(
        "POST",
        "/echo",
        &[(PUBLIC_KEY_HEADER, pk_header.as_str())],
        &encrypt(&payload, &key),
    );
    let (status, body) = split_response(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 200);

    let plaintext = decrypt(&body, &key).expect("response did not decrypt");
    let value: Value = serde_json::from_str(&plaintext).expect("decrypted body is not json");
    assert_eq!(value["ok"], json!(true));
    assert_eq!(value["data"]["title"], json!("Cacdila 10v"));
    assert_eq!(value["data"]["tag"], json!("fast"));
    assert_eq!(value["data"]["count"], json!(3));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn secure_mode_requires_the_public_key_header() {
    let (addr, handle, task) = start(test_config(true), vec![echo_route()]).await;

    let body = json!({"title": "t", "tag": "g"}).to_string();
    let raw = build_request("POST", "/echo", &[("Content-Type", "application/json")], &body);
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);

    assert_eq!(status, 400);
    assert_eq!(value["error"], json!("MalformedRequest"));
    assert!(value["message"].as_str().unwrap().contains("public key"));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn secure_mode_requires_a_completed_handshake() {
    let (addr, handle, task) = start(test_config(true), vec![echo_route()]).await;

    // a public value the server has never negotiated with
    let raw = build_request("POST", "/echo", &[(PUBLIC_KEY_HEADER, "424242")], "00ff");
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);

    assert_eq!(status, 400);
    assert!(value["message"].as_str().unwrap().contains("/handshake"));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn connection_cap_sheds_load_without_a_response() {
    let mut cfg = test_config(false);
    cfg.limits.max_active_conns = 0;
    let (addr, handle, task) = start(cfg, vec![echo_route()]).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    let raw = build_request("POST", "/echo", &[], "");
    // the write may or may not succeed depending on close timing
    let _ = stream.write_all(raw.as_bytes()).await;
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    assert!(buf.is_empty(), "shed connection must not receive a response");

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn hooks_attach_capabilities_and_override_the_response() {
    use kresnik::common::error::RequestError;
    use kresnik::net::Hooks;
    use kresnik::protocol::Response;
    use kresnik::recommend::Strategy;
    use kresnik::router::Context;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedStrategy {
        last_update: AtomicI64,
    }

    impl Strategy for FixedStrategy {
        fn update(&self, _ctx: &Context, item_id: i64, _liked: bool) -> Result<(), RequestError> {
            self.last_update.store(item_id, Ordering::Relaxed);
            Ok(())
        }

        fn next(&self, _ctx: &Context) -> Result<Value, RequestError> {
            Ok(json!({"id": self.last_update.load(Ordering::Relaxed) + 1, "name": "Cacdila 10v"}))
        }
    }

    struct TestHooks {
        strategy: Arc<FixedStrategy>,
    }

    impl Hooks for TestHooks {
        fn before_handle(&self, ctx: &mut Context) -> Result<(), RequestError> {
            ctx.strategy = Some(self.strategy.clone());
            Ok(())
        }

        fn override_response(&self, _ctx: &Context, mut response: Response) -> Response {
            response.headers.push(("X-Handled".into(), "1".into()));
            response
        }
    }

    let swipe = Route::post("/swipe", |ctx, args| {
        let strategy = ctx
            .strategy
            .clone()
            .ok_or_else(|| RequestError::internal("StrategyError", "no strategy attached"))?;
        strategy.update(ctx, args.i64("car_id")?, args.bool("like")?)?;
        Ok(Value::Null)
    })
    .param("car_id", ParamKind::Int)
    .param("like", ParamKind::Bool);

    let car = Route::get("/car", |ctx, _args| {
        let strategy = ctx
            .strategy
            .clone()
            .ok_or_else(|| RequestError::internal("StrategyError", "no strategy attached"))?;
        strategy.next(ctx)
    });

    let db = SharedStorage::new(MemoryStorage::new());
    let mut server = Server::new(Arc::new(test_config(false)), db);
    server.register(swipe);
    server.register(car);
    server.set_hooks(Arc::new(TestHooks {
        strategy: Arc::new(FixedStrategy {
            last_update: AtomicI64::new(0),
        }),
    }));

    let running = server.bind().expect("bind failed");
    let addr = running.local_addr().expect("no local addr");
    let handle = running.handle();
    let task = tokio::spawn(running.serve());

    // swipe feeds the strategy through the update seam
    let body = json!({"car_id": 7, "like": true}).to_string();
    let raw = build_request("POST", "/swipe", &[("Content-Type", "application/json")], &body);
    let wire = exchange(addr, raw.as_str()).await;
    let (status, value) = json_body(&wire);
    assert_eq!(status, 200);
    assert_eq!(value["ok"], json!(true));
    assert!(wire.contains("\r\nX-Handled: 1\r\n"));

    // the next recommendation reflects the recorded swipe
    let raw = build_request("GET", "/car", &[], "");
    let (status, value) = json_body(&exchange(addr, raw.as_str()).await);
    assert_eq!(status, 200);
    assert_eq!(value["data"]["id"], json!(8));

    handle.close();
    let _ = task.await;
}

#[tokio::test]
async fn close_releases_the_listening_socket() {
    let (addr, handle, task) = start(test_config(false), vec![echo_route()]).await;

    handle.close();
    let _ = task.await;

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "socket should be released after close"
    );
}
