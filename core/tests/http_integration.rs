/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration test against a public server. Performs real HTTPS requests through the
 * engine and verifies ALPN negotiation, HPACK and Huffman decoding, and redirect handling.
 *
 * Run with:
 *   cargo test -p httpcall_core --test http_integration -- --ignored --nocapture
 */

use httpcall_core::{request, HttpVersion, Method, RequestSpec};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
#[ignore] // requires network
fn get_over_h2_with_system_roots() {
    init_tracing();
    let spec = RequestSpec::builder("https://www.google.com/")
        .method(Method::Get)
        .header("Accept", "text/html")
        .build();
    let res = request(spec).expect("request failed");

    println!("{} {} ({})", res.status, res.message, res.version);
    for (name, values) in &res.headers {
        println!("{}: {}", name, values.join(", "));
    }
    assert_eq!(res.version, HttpVersion::Http2, "expected h2 ALPN negotiation");
    assert!(res.status < 400);
    assert!(res.content_type.is_some());
}

#[test]
#[ignore] // requires network
fn http1_when_h2_disabled() {
    init_tracing();
    let spec = RequestSpec::builder("https://www.google.com/")
        .disable_http2(true)
        .build();
    let res = request(spec).expect("request failed");
    assert_eq!(res.version, HttpVersion::Http1_1);
    assert!(res.body.is_some());
}
