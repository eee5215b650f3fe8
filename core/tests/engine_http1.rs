/*
 * engine_http1.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end requests over plaintext HTTP/1.1 against local mock servers: entity encoding,
 * redirects, timeouts, basic auth and proxy forwarding.
 */

mod common;

use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use common::{response, MockServer};
use httpcall_core::engine::multipart;
use httpcall_core::mime::parse_content_type;
use httpcall_core::{
    request, Body, Engine, EngineConfig, HttpVersion, Method, PartSpec, ProxySpec, RequestError, RequestSpec,
    TimeoutPhase,
};

fn ok_text(body: &str) -> Vec<u8> {
    response("200 OK", &[("Content-Type", "text/plain; charset=utf-8")], body.as_bytes())
}

#[test]
fn form_post_sends_urlencoded_body() {
    let server = MockServer::start(|_| ok_text("created"));
    let spec = RequestSpec::builder(server.url("/submit"))
        .method(Method::Post)
        .form("a", "1")
        .form("b", "2")
        .build();
    let res = request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.path(), "/submit");
    assert_eq!(seen.body, b"a=1&b=2");
    assert_eq!(seen.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(seen.header("content-length"), Some("7"));
    assert_eq!(seen.header("connection"), Some("close"));
    assert!(seen.header("user-agent").unwrap().starts_with("httpcall/"));

    assert_eq!(res.status, 200);
    assert_eq!(res.message, "OK");
    assert_eq!(res.body.as_deref(), Some("created"));
    assert_eq!(res.version, HttpVersion::Http1_1);
}

#[test]
fn get_folds_form_params_into_query() {
    let server = MockServer::start(|_| ok_text(""));
    let spec = RequestSpec::builder(server.url("/search"))
        .form("q", "rust lang")
        .form("tag", ["a&b", "c"])
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.path(), "/search?q=rust+lang&tag=a%26b&tag=c");
    assert!(seen.body.is_empty());
    assert_eq!(seen.header("content-type"), None);
}

#[test]
fn query_params_keep_form_params_in_body() {
    let server = MockServer::start(|_| ok_text(""));
    let spec = RequestSpec::builder(server.url("/p?x=0"))
        .query("page", "2")
        .form("a", "1")
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.path(), "/p?x=0&page=2");
    assert_eq!(seen.body, b"a=1");
}

#[test]
fn multipart_upload_round_trips() {
    let server = MockServer::start(|_| ok_text("stored"));
    let spec = RequestSpec::builder(server.url("/upload"))
        .method(Method::Post)
        .part(PartSpec::new("comment", "hello"))
        .part(
            PartSpec::new("file", Body::reader(Cursor::new(vec![1u8, 2, 3, 0, 255])))
                .file_name("blob.bin")
                .content_type("application/octet-stream"),
        )
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    let ct = parse_content_type(seen.header("content-type").unwrap()).unwrap();
    assert!(ct.is_mime_type("multipart", "form-data"));
    let boundary = ct.parameter("boundary").unwrap();
    let parts = multipart::parse(&seen.body, boundary).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "comment");
    assert_eq!(&parts[0].data[..], b"hello");
    assert_eq!(parts[1].file_name.as_deref(), Some("blob.bin"));
    assert_eq!(&parts[1].data[..], &[1u8, 2, 3, 0, 255]);
}

#[test]
fn stream_body_is_sent_chunked() {
    let server = MockServer::start(|_| ok_text(""));
    let payload = vec![b'z'; 50_000];
    let spec = RequestSpec::builder(server.url("/stream"))
        .method(Method::Put)
        .body(Body::reader(Cursor::new(payload.clone())))
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.header("transfer-encoding"), Some("chunked"));
    assert_eq!(seen.header("content-type"), Some("application/octet-stream"));
    assert_eq!(seen.body, payload);
}

#[test]
fn explicit_content_type_wins_over_inference() {
    let server = MockServer::start(|_| ok_text(""));
    let spec = RequestSpec::builder(server.url("/json"))
        .method(Method::Post)
        .body(r#"{"k":"v"}"#)
        .content_type("application/json")
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.header("content-type"), Some("application/json"));
    assert_eq!(seen.body, br#"{"k":"v"}"#);
}

#[test]
fn basic_auth_is_sent_preemptively() {
    let server = MockServer::start(|_| ok_text(""));
    let spec = RequestSpec::builder(server.url("/private"))
        .auth("Aladdin", "open sesame")
        .build();
    request(spec).unwrap();

    let seen = server.next_request();
    assert_eq!(seen.header("authorization"), Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="));
}

#[test]
fn see_other_redirect_becomes_get() {
    let server = MockServer::start(|req| match req.path() {
        "/submit" => response("303 See Other", &[("Location", "/result")], b""),
        _ => ok_text("done"),
    });
    let spec = RequestSpec::builder(server.url("/submit"))
        .method(Method::Post)
        .body("payload")
        .build();
    let res = request(spec).unwrap();

    assert_eq!(server.next_request().method, "POST");
    let second = server.next_request();
    assert_eq!(second.method, "GET");
    assert_eq!(second.path(), "/result");
    assert!(second.body.is_empty());
    assert_eq!(second.header("content-type"), None);

    assert_eq!(res.status, 200);
    assert_eq!(res.url.path(), "/result");
    assert_eq!(res.body.as_deref(), Some("done"));
}

#[test]
fn permanent_redirect_preserves_method_and_body() {
    let server = MockServer::start(|req| match req.path() {
        "/v1/items" => response("308 Permanent Redirect", &[("Location", "/v2/items")], b""),
        _ => ok_text("moved"),
    });
    let spec = RequestSpec::builder(server.url("/v1/items"))
        .method(Method::Put)
        .body("payload")
        .build();
    request(spec).unwrap();

    server.next_request();
    let second = server.next_request();
    assert_eq!(second.method, "PUT");
    assert_eq!(second.path(), "/v2/items");
    assert_eq!(second.body, b"payload");
}

#[test]
fn redirect_loop_fails_with_too_many_redirects() {
    let server = MockServer::start(|_| response("302 Found", &[("Location", "/again")], b""));
    let engine = Engine::new(EngineConfig {
        max_redirects: 3,
        ..EngineConfig::default()
    });
    let err = engine.request(RequestSpec::builder(server.url("/")).build()).unwrap_err();
    assert!(matches!(err, RequestError::TooManyRedirects { max: 3 }), "{:?}", err);
    for _ in 0..4 {
        server.next_request();
    }
    assert!(server.try_next_request().is_none());
}

#[test]
fn redirects_not_followed_when_disabled() {
    let server = MockServer::start(|_| response("302 Found", &[("Location", "/elsewhere")], b""));
    let spec = RequestSpec::builder(server.url("/"))
        .follow_redirects(false)
        .build();
    let res = request(spec).unwrap();
    assert_eq!(res.status, 302);
    assert_eq!(res.message, "Found");
    assert_eq!(res.first_header("location"), Some("/elsewhere"));
    assert!(server.try_next_request().is_some());
    assert!(server.try_next_request().is_none());
}

#[test]
fn silent_server_is_read_timeout() {
    let server = MockServer::start(|_| {
        thread::sleep(Duration::from_millis(1500));
        ok_text("late")
    });
    let spec = RequestSpec::builder(server.url("/slow"))
        .read_timeout_ms(200)
        .build();
    let err = request(spec).unwrap_err();
    assert!(err.is_timeout(), "{:?}", err);
    assert_eq!(err.timeout_phase(), Some(TimeoutPhase::Read));
}

#[test]
fn slow_reader_does_not_trip_read_timeout_on_upload() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    length = value.trim().parse().unwrap();
                }
            }
        }
        // Drain 64 KiB every 20 ms: steady progress, far slower than the client can write.
        let mut piece = vec![0u8; 64 * 1024];
        let mut received = 0usize;
        while received < length {
            thread::sleep(Duration::from_millis(20));
            let want = piece.len().min(length - received);
            let n = reader.read(&mut piece[..want]).unwrap();
            assert!(n > 0, "client closed early");
            received += n;
        }
        let body = received.to_string();
        let mut stream = reader.into_inner();
        stream
            .write_all(&response("200 OK", &[("Content-Type", "text/plain")], body.as_bytes()))
            .unwrap();
        received
    });

    let upload = vec![b'x'; 8 * 1024 * 1024];
    let spec = RequestSpec::builder(format!("http://127.0.0.1:{}/upload", port))
        .method(Method::Post)
        .body(upload.clone())
        .read_timeout_ms(500)
        .build();
    let res = request(spec).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body.as_deref(), Some(upload.len().to_string().as_str()));
    assert_eq!(server.join().unwrap(), upload.len());
}

#[test]
fn refused_connection_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = request(RequestSpec::builder(format!("http://127.0.0.1:{}/", port)).build()).unwrap_err();
    assert!(err.is_transport(), "{:?}", err);
}

#[test]
fn chunked_response_with_charset_is_decoded() {
    let server = MockServer::start(|_| {
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=ISO-8859-1\r\nTransfer-Encoding: chunked\r\n\r\n\
          4\r\ncaf\xe9\r\n6\r\n au la\r\n2\r\nit\r\n0\r\n\r\n"
            .to_vec()
    });
    let mut res = request(RequestSpec::builder(server.url("/menu")).build()).unwrap();
    assert_eq!(res.body.as_deref(), Some("caf\u{e9} au lait"));
    let mut raw = Vec::new();
    res.take_body_stream().unwrap().read_to_end(&mut raw).unwrap();
    assert_eq!(raw, b"caf\xe9 au lait");
}

#[test]
fn binary_response_only_has_stream() {
    let server = MockServer::start(|_| {
        response(
            "200 OK",
            &[("Content-Type", "image/png"), ("X-Trace", "a"), ("x-trace", "b")],
            &[0x89, b'P', b'N', b'G'],
        )
    });
    let mut res = request(RequestSpec::builder(server.url("/logo.png")).build()).unwrap();
    assert!(res.body.is_none());
    assert_eq!(res.content_type.as_deref(), Some("image/png"));
    assert_eq!(res.header("x-trace").unwrap(), &["a".to_string(), "b".to_string()]);
    assert_eq!(res.take_body_stream().unwrap().into_bytes().as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[test]
fn head_response_has_no_body() {
    let server = MockServer::start(|_| {
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 1234\r\n\r\n".to_vec()
    });
    let res = request(RequestSpec::builder(server.url("/doc")).method(Method::Head).build()).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.first_header("content-length"), Some("1234"));
    assert_eq!(res.body.as_deref(), Some(""));
}

#[test]
fn plaintext_proxy_forwards_absolute_form() {
    let proxy = MockServer::start(|_| ok_text("via proxy"));
    let spec = RequestSpec::builder("http://origin.test/path?x=1")
        .proxy(ProxySpec::new("127.0.0.1", proxy.addr.port()).credentials("pu", "pw"))
        .build();
    let res = request(spec).unwrap();

    let seen = proxy.next_request();
    assert_eq!(seen.target, "http://origin.test/path?x=1");
    assert_eq!(seen.header("host"), Some("origin.test"));
    assert_eq!(seen.header("proxy-authorization"), Some("Basic cHU6cHc="));
    assert_eq!(res.body.as_deref(), Some("via proxy"));
}

#[test]
fn interim_continue_is_skipped() {
    let server = MockServer::start(|_| {
        let mut out = b"HTTP/1.1 100 Continue\r\n\r\n".to_vec();
        out.extend(response("201 Created", &[], b""));
        out
    });
    let res = request(
        RequestSpec::builder(server.url("/items"))
            .method(Method::Post)
            .body("x")
            .build(),
    )
    .unwrap();
    assert_eq!(res.status, 201);
    assert_eq!(res.message, "Created");
}
