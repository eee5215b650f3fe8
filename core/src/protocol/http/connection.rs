/*
 * connection.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Httpcall, a synchronous HTTP request engine.
 *
 * Httpcall is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Httpcall is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Httpcall.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP connection: one TCP or TLS stream, drives the H1 or H2 parser and invokes the
//! `ResponseHandler`. One request per connection; every read and write is bounded by the
//! read timeout.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::future::Future;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as TokioTlsStream;

use crate::protocol::http::h1::{body_mode, BodyMode, H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::h2::{
    error_to_string, H2FrameHandler, H2Parser, H2Writer, CONNECTION_PREFACE, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_WINDOW_SIZE, ERROR_COMPRESSION_ERROR, ERROR_FLOW_CONTROL_ERROR, ERROR_NO_ERROR,
    ERROR_PROTOCOL_ERROR, MAX_MAX_FRAME_SIZE, MAX_WINDOW_SIZE, MIN_MAX_FRAME_SIZE,
    SETTINGS_ENABLE_PUSH, SETTINGS_INITIAL_WINDOW_SIZE, SETTINGS_MAX_FRAME_SIZE,
};
use crate::protocol::http::hpack::{encode_request_headers, Decoder as HpackDecoder};
use crate::protocol::http::request::{Method, RequestBody, RequestBuilder};
use crate::protocol::http::response::Response;
use crate::protocol::http::ResponseHandler;

/// Size of reads from a streamed request body.
const BODY_CHUNK: usize = 16 * 1024;

/// Received bytes after which a WINDOW_UPDATE is sent.
const WINDOW_UPDATE_THRESHOLD: u32 = DEFAULT_WINDOW_SIZE / 2;

/// Header fields that are connection-specific and must not appear in an HTTP/2 request.
const H2_EXCLUDED_HEADERS: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

/// Negotiated protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1_1,
    Http2,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVersion::Http1_1 => f.write_str("HTTP/1.1"),
            HttpVersion::Http2 => f.write_str("HTTP/2"),
        }
    }
}

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Run an I/O future under the read deadline; expiry becomes `io::ErrorKind::TimedOut`.
async fn deadline<T>(limit: Duration, fut: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
    }
}

fn read_body_chunk(reader: &mut (dyn Read + Send), buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Bridges H1 parser callbacks to the user's ResponseHandler. Headers are held back until
/// the caller knows whether the response is interim (1xx) or final.
struct H1Driver<'a> {
    status: Option<(u16, Option<String>)>,
    headers: Vec<(String, String)>,
    in_body: bool,
    handler: &'a mut dyn ResponseHandler,
}

impl H1Driver<'_> {
    fn deliver_head(&mut self, code: u16, reason: Option<String>, has_body: bool) {
        let response = match reason {
            Some(r) => Response::with_reason(code, r),
            None => Response::new(code),
        };
        if response.is_success() {
            self.handler.ok(response);
        } else {
            self.handler.error(response);
        }
        for (name, value) in &self.headers {
            self.handler.header(name, value);
        }
        if has_body {
            self.in_body = true;
            self.handler.start_body();
        }
    }
}

impl H1ResponseHandler for H1Driver<'_> {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.status = Some((code, reason.map(str::to_string)));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, data: &[u8]) {
        self.handler.body_chunk(data);
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.handler.header(name, value);
    }

    fn complete(&mut self) {
        if self.in_body {
            self.in_body = false;
            self.handler.end_body();
        }
        self.handler.complete();
    }
}

/// State of the single HTTP/2 stream this connection carries, plus the connection-level
/// flow-control and settings it depends on.
struct H2Exchange<'a> {
    stream_id: u32,
    handler: &'a mut dyn ResponseHandler,
    decoder: HpackDecoder,
    /// Frames to send in reply (SETTINGS ACK, PING ACK, WINDOW_UPDATE, GOAWAY).
    writer: H2Writer,
    header_block: BytesMut,
    /// Stream whose header block is being continued; only CONTINUATION may follow.
    continuing: Option<u32>,
    header_end_stream: bool,
    peer_max_frame_size: usize,
    peer_initial_window: u32,
    conn_send_window: i64,
    stream_send_window: i64,
    conn_unacked: u32,
    stream_unacked: u32,
    got_final_headers: bool,
    in_body: bool,
    done: bool,
    error: Option<io::Error>,
}

impl<'a> H2Exchange<'a> {
    fn new(stream_id: u32, handler: &'a mut dyn ResponseHandler) -> Self {
        Self {
            stream_id,
            handler,
            decoder: HpackDecoder::new(4096),
            writer: H2Writer::new(),
            header_block: BytesMut::new(),
            continuing: None,
            header_end_stream: false,
            peer_max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            peer_initial_window: DEFAULT_WINDOW_SIZE,
            conn_send_window: DEFAULT_WINDOW_SIZE as i64,
            stream_send_window: DEFAULT_WINDOW_SIZE as i64,
            conn_unacked: 0,
            stream_unacked: 0,
            got_final_headers: false,
            in_body: false,
            done: false,
            error: None,
        }
    }

    /// Bytes of DATA we may send right now.
    fn send_capacity(&self) -> usize {
        self.conn_send_window
            .min(self.stream_send_window)
            .clamp(0, self.peer_max_frame_size as i64) as usize
    }

    fn consume_send_window(&mut self, n: usize) {
        self.conn_send_window -= n as i64;
        self.stream_send_window -= n as i64;
    }

    fn fail(&mut self, code: u32, message: String) {
        if self.error.is_none() {
            self.writer.write_goaway(0, code, message.as_bytes());
            self.error = Some(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("HTTP/2 {}: {}", error_to_string(code), message),
            ));
        }
    }

    fn end_body(&mut self) {
        if self.in_body {
            self.in_body = false;
            self.handler.end_body();
        }
    }

    fn finish(&mut self) {
        self.end_body();
        self.handler.complete();
        self.done = true;
    }

    fn header_block_complete(&mut self) {
        self.continuing = None;
        let block = self.header_block.split().freeze();
        let mut fields: Vec<(String, String)> = Vec::new();
        if let Err(e) = self.decoder.decode(&mut &block[..], &mut fields) {
            self.fail(ERROR_COMPRESSION_ERROR, e.to_string());
            return;
        }
        if self.got_final_headers {
            // trailers
            self.end_body();
            for (name, value) in fields.iter().filter(|(n, _)| !n.starts_with(':')) {
                self.handler.header(name, value);
            }
        } else {
            let code = fields
                .iter()
                .find(|(n, _)| n == ":status")
                .and_then(|(_, v)| v.parse::<u16>().ok());
            let Some(code) = code else {
                self.fail(ERROR_PROTOCOL_ERROR, "response without :status".into());
                return;
            };
            if (100..200).contains(&code) {
                return; // interim response
            }
            self.got_final_headers = true;
            let response = Response::new(code);
            if response.is_success() {
                self.handler.ok(response);
            } else {
                self.handler.error(response);
            }
            for (name, value) in fields.iter().filter(|(n, _)| !n.starts_with(':')) {
                self.handler.header(name, value);
            }
        }
        if self.header_end_stream {
            self.finish();
        }
    }

    fn check_continuation(&mut self, stream_id: u32) -> bool {
        match self.continuing {
            Some(id) if id != stream_id => {
                self.fail(ERROR_PROTOCOL_ERROR, "expected CONTINUATION".into());
                false
            }
            Some(_) => true,
            None => true,
        }
    }
}

impl H2FrameHandler for H2Exchange<'_> {
    fn data_frame_received(&mut self, stream_id: u32, end_stream: bool, data: Bytes, flow_len: u32) {
        if self.continuing.is_some() {
            self.fail(ERROR_PROTOCOL_ERROR, "DATA inside header block".into());
            return;
        }
        self.conn_unacked += flow_len;
        if self.conn_unacked >= WINDOW_UPDATE_THRESHOLD {
            self.writer.write_window_update(0, self.conn_unacked);
            self.conn_unacked = 0;
        }
        if stream_id != self.stream_id || self.done {
            return;
        }
        if !self.got_final_headers {
            self.fail(ERROR_PROTOCOL_ERROR, "DATA before response headers".into());
            return;
        }
        self.stream_unacked += flow_len;
        if !end_stream && self.stream_unacked >= WINDOW_UPDATE_THRESHOLD {
            self.writer.write_window_update(self.stream_id, self.stream_unacked);
            self.stream_unacked = 0;
        }
        if !data.is_empty() {
            if !self.in_body {
                self.in_body = true;
                self.handler.start_body();
            }
            self.handler.body_chunk(&data);
        }
        if end_stream {
            self.finish();
        }
    }

    fn headers_frame_received(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        header_block_fragment: Bytes,
    ) {
        if self.continuing.is_some() {
            self.fail(ERROR_PROTOCOL_ERROR, "HEADERS inside header block".into());
            return;
        }
        if stream_id != self.stream_id {
            self.fail(ERROR_PROTOCOL_ERROR, format!("HEADERS on unknown stream {}", stream_id));
            return;
        }
        self.header_block.clear();
        self.header_block.extend_from_slice(&header_block_fragment);
        self.header_end_stream = end_stream;
        if end_headers {
            self.header_block_complete();
        } else {
            self.continuing = Some(stream_id);
        }
    }

    fn rst_stream_frame_received(&mut self, stream_id: u32, error_code: u32) {
        if stream_id == self.stream_id && !self.done && self.error.is_none() {
            self.error = Some(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("HTTP/2 stream reset by peer: {}", error_to_string(error_code)),
            ));
        }
    }

    fn settings_frame_received(&mut self, ack: bool, settings: Vec<(u16, u32)>) {
        if ack {
            return;
        }
        for (id, value) in settings {
            match id {
                SETTINGS_INITIAL_WINDOW_SIZE => {
                    if value > MAX_WINDOW_SIZE {
                        self.fail(ERROR_FLOW_CONTROL_ERROR, "initial window size too large".into());
                        return;
                    }
                    self.stream_send_window += value as i64 - self.peer_initial_window as i64;
                    self.peer_initial_window = value;
                }
                SETTINGS_MAX_FRAME_SIZE => {
                    let size = value as usize;
                    if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&size) {
                        self.fail(ERROR_PROTOCOL_ERROR, "invalid max frame size".into());
                        return;
                    }
                    self.peer_max_frame_size = size;
                }
                _ => {}
            }
        }
        self.writer.write_settings_ack();
    }

    fn push_promise_frame_received(&mut self, _stream_id: u32, _promised_stream_id: u32) {
        self.fail(ERROR_PROTOCOL_ERROR, "PUSH_PROMISE with push disabled".into());
    }

    fn ping_frame_received(&mut self, ack: bool, opaque_data: u64) {
        if !ack {
            self.writer.write_ping(opaque_data, true);
        }
    }

    fn goaway_frame_received(&mut self, last_stream_id: u32, error_code: u32, debug_data: Bytes) {
        if self.done || self.error.is_some() {
            return;
        }
        if last_stream_id < self.stream_id || error_code != ERROR_NO_ERROR {
            let debug = String::from_utf8_lossy(&debug_data);
            self.error = Some(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!("HTTP/2 GOAWAY from peer: {} {}", error_to_string(error_code), debug)
                    .trim_end()
                    .to_string(),
            ));
        }
    }

    fn window_update_frame_received(&mut self, stream_id: u32, window_size_increment: u32) {
        let window = if stream_id == 0 {
            &mut self.conn_send_window
        } else if stream_id == self.stream_id {
            &mut self.stream_send_window
        } else {
            return;
        };
        *window += window_size_increment as i64;
        if *window > MAX_WINDOW_SIZE as i64 {
            self.fail(ERROR_FLOW_CONTROL_ERROR, "flow-control window overflow".into());
        }
    }

    fn continuation_frame_received(
        &mut self,
        stream_id: u32,
        end_headers: bool,
        header_block_fragment: Bytes,
    ) {
        if self.continuing.is_none() {
            self.fail(ERROR_PROTOCOL_ERROR, "unexpected CONTINUATION".into());
            return;
        }
        if !self.check_continuation(stream_id) {
            return;
        }
        self.header_block.extend_from_slice(&header_block_fragment);
        if end_headers {
            self.header_block_complete();
        }
    }

    fn frame_error(&mut self, error_code: u32, _stream_id: u32, message: String) {
        self.fail(error_code, message);
    }
}

/// HTTP connection: holds the stream and negotiated version. Call `send()` to issue the request.
pub struct HttpConnection {
    stream: HttpStream,
    version: HttpVersion,
    read_timeout: Duration,
    read_buf: BytesMut,
}

impl HttpConnection {
    /// Wrap an already-connected stream. Used by `HttpClient::connect()`.
    pub fn new(stream: HttpStream, version: HttpVersion, read_timeout: Duration) -> Self {
        Self {
            stream,
            version,
            read_timeout,
            read_buf: BytesMut::with_capacity(16 * 1024),
        }
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// Send the request and run the read loop until the response is complete. Handler is
    /// invoked as data arrives.
    pub async fn send(
        &mut self,
        request: RequestBuilder,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        match self.version {
            HttpVersion::Http1_1 => self.send_http1(request, handler).await,
            HttpVersion::Http2 => self.send_http2(request, handler).await,
        }
    }

    /// Read more bytes into the buffer. Returns 0 at end of stream.
    async fn fill(&mut self) -> io::Result<usize> {
        let limit = self.read_timeout;
        deadline(limit, self.stream.read_buf(&mut self.read_buf)).await
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let limit = self.read_timeout;
        deadline(limit, async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        })
        .await
    }

    async fn send_http1(
        &mut self,
        request: RequestBuilder,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        let head_request = request.method == Method::Head;
        let RequestBuilder { body, .. } = self.write_http1_head(request).await?;
        match body {
            RequestBody::Empty => {}
            RequestBody::Bytes(data) => {
                // Each slice gets its own deadline so the read timeout bounds stalls, not the
                // total upload time.
                for slice in data.chunks(BODY_CHUNK) {
                    self.write(slice).await?;
                }
            }
            RequestBody::Stream(mut reader) => {
                let mut chunk = vec![0u8; BODY_CHUNK];
                loop {
                    let n = read_body_chunk(reader.as_mut(), &mut chunk)?;
                    if n == 0 {
                        self.write(b"0\r\n\r\n").await?;
                        break;
                    }
                    let mut framed = Vec::with_capacity(n + 12);
                    framed.extend_from_slice(format!("{:x}\r\n", n).as_bytes());
                    framed.extend_from_slice(&chunk[..n]);
                    framed.extend_from_slice(b"\r\n");
                    self.write(&framed).await?;
                }
            }
        }

        let mut parser = ResponseParser::new();
        let mut driver = H1Driver {
            status: None,
            headers: Vec::new(),
            in_body: false,
            handler,
        };
        loop {
            parser.receive(&mut self.read_buf, &mut driver)?;
            match parser.state() {
                ParseState::HeadersComplete => {
                    let (code, reason) = driver.status.take().unwrap_or((0, None));
                    if (100..200).contains(&code) && code != 101 {
                        tracing::trace!(code, "skipping interim response");
                        driver.headers.clear();
                        parser.reset();
                        continue;
                    }
                    let mode = body_mode(code, head_request, &driver.headers);
                    driver.deliver_head(code, reason, mode != BodyMode::Empty);
                    parser.set_body_mode(mode, &mut driver);
                    continue;
                }
                ParseState::Idle => return Ok(()),
                _ => {}
            }
            if self.fill().await? == 0 {
                return parser.eof(&mut driver);
            }
        }
    }

    /// Serialize and send the request line and header section; returns the request so the
    /// caller can send its body.
    async fn write_http1_head(&mut self, request: RequestBuilder) -> io::Result<RequestBuilder> {
        let mut head = format!("{} {} HTTP/1.1\r\n", request.method, request.target);
        if !request.has_header("Host") {
            head.push_str(&format!("Host: {}\r\n", request.authority));
        }
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("connection") {
                continue;
            }
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        match &request.body {
            RequestBody::Bytes(data) => {
                if !request.has_header("Content-Length") {
                    head.push_str(&format!("Content-Length: {}\r\n", data.len()));
                }
            }
            RequestBody::Stream(_) => {
                if !request.has_header("Transfer-Encoding") {
                    head.push_str("Transfer-Encoding: chunked\r\n");
                }
            }
            RequestBody::Empty => {
                if request.method.expects_body() && !request.has_header("Content-Length") {
                    head.push_str("Content-Length: 0\r\n");
                }
            }
        }
        head.push_str("Connection: close\r\n\r\n");
        self.write(head.as_bytes()).await?;
        Ok(request)
    }

    async fn send_http2(
        &mut self,
        request: RequestBuilder,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        const STREAM_ID: u32 = 1;
        let mut parser = H2Parser::new();
        let mut exchange = H2Exchange::new(STREAM_ID, handler);

        let mut fields: Vec<(&str, &str)> = vec![
            (":method", request.method.as_str()),
            (":scheme", request.scheme.as_str()),
            (":authority", request.authority.as_str()),
            (":path", request.path.as_str()),
        ];
        for (name, value) in &request.headers {
            let excluded = H2_EXCLUDED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
                || (name.eq_ignore_ascii_case("te") && !value.eq_ignore_ascii_case("trailers"));
            if !excluded {
                fields.push((name.as_str(), value.as_str()));
            }
        }
        let content_length = match &request.body {
            RequestBody::Bytes(data) if !request.has_header("content-length") => {
                Some(data.len().to_string())
            }
            RequestBody::Empty if request.method.expects_body() => Some("0".to_string()),
            _ => None,
        };
        if let Some(len) = &content_length {
            fields.push(("content-length", len.as_str()));
        }
        let mut block = BytesMut::new();
        encode_request_headers(&fields, &mut block);

        let mut out = H2Writer::new();
        out.write_settings(&[(SETTINGS_ENABLE_PUSH, 0)]);
        let end_stream = request.body.is_empty();
        out.write_header_block(STREAM_ID, &block, end_stream, DEFAULT_MAX_FRAME_SIZE);
        let mut preface = BytesMut::from(CONNECTION_PREFACE);
        preface.extend_from_slice(&out.take_buffer());
        self.write(&preface).await?;

        match request.body {
            RequestBody::Empty => {}
            RequestBody::Bytes(data) if data.is_empty() => {}
            RequestBody::Bytes(data) => {
                let mut sent = 0;
                while sent < data.len() {
                    let n = self.h2_wait_capacity(&mut parser, &mut exchange).await?;
                    if exchange.done {
                        return Ok(());
                    }
                    let n = n.min(data.len() - sent);
                    let last = sent + n == data.len();
                    out.write_data(STREAM_ID, &data[sent..sent + n], last);
                    exchange.consume_send_window(n);
                    sent += n;
                    self.write(&out.take_buffer()).await?;
                }
            }
            RequestBody::Stream(mut reader) => {
                let mut chunk = vec![0u8; BODY_CHUNK];
                loop {
                    let len = read_body_chunk(reader.as_mut(), &mut chunk)?;
                    if len == 0 {
                        out.write_data(STREAM_ID, &[], true);
                        self.write(&out.take_buffer()).await?;
                        break;
                    }
                    let mut sent = 0;
                    while sent < len {
                        let n = self.h2_wait_capacity(&mut parser, &mut exchange).await?;
                        if exchange.done {
                            return Ok(());
                        }
                        let n = n.min(len - sent);
                        out.write_data(STREAM_ID, &chunk[sent..sent + n], false);
                        exchange.consume_send_window(n);
                        sent += n;
                        self.write(&out.take_buffer()).await?;
                    }
                }
            }
        }

        while !exchange.done {
            self.h2_read(&mut parser, &mut exchange).await?;
        }
        self.h2_flush_replies(&mut exchange).await
    }

    /// Process frames until at least one byte of DATA may be sent (or the response already
    /// finished, in which case the rest of the body is abandoned).
    async fn h2_wait_capacity(
        &mut self,
        parser: &mut H2Parser,
        exchange: &mut H2Exchange<'_>,
    ) -> io::Result<usize> {
        loop {
            // Frames already buffered (e.g. SETTINGS lowering the window) apply first.
            parser.receive(&mut self.read_buf, exchange);
            self.h2_flush_replies(exchange).await?;
            let capacity = exchange.send_capacity();
            if capacity > 0 || exchange.done {
                return Ok(capacity);
            }
            self.h2_read(parser, exchange).await?;
        }
    }

    /// Read once from the stream and dispatch any complete frames.
    async fn h2_read(&mut self, parser: &mut H2Parser, exchange: &mut H2Exchange<'_>) -> io::Result<()> {
        parser.receive(&mut self.read_buf, exchange);
        self.h2_flush_replies(exchange).await?;
        if exchange.done {
            return Ok(());
        }
        if self.fill().await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "HTTP/2 connection closed before response was complete",
            ));
        }
        parser.receive(&mut self.read_buf, exchange);
        self.h2_flush_replies(exchange).await
    }

    /// Send queued control frames, then surface any connection or stream error.
    async fn h2_flush_replies(&mut self, exchange: &mut H2Exchange<'_>) -> io::Result<()> {
        if !exchange.writer.is_empty() {
            let pending = exchange.writer.take_buffer();
            let written = self.write(&pending).await;
            if exchange.error.is_none() {
                written?;
            }
        }
        match exchange.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        body: Vec<u8>,
    }

    impl ResponseHandler for Recorder {
        fn ok(&mut self, response: Response) {
            self.events.push(format!("ok {}", response.code));
        }
        fn error(&mut self, response: Response) {
            self.events.push(format!("error {}", response.code));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.events.push(format!("{}: {}", name, value));
        }
        fn start_body(&mut self) {
            self.events.push("start".into());
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn end_body(&mut self) {
            self.events.push("end".into());
        }
        fn complete(&mut self) {
            self.events.push("complete".into());
        }
    }

    fn hpack(fields: &[(&str, &str)]) -> Bytes {
        let mut block = BytesMut::new();
        encode_request_headers(fields, &mut block);
        block.freeze()
    }

    #[test]
    fn h2_exchange_headers_data_and_trailers() {
        let mut rec = Recorder::default();
        let mut ex = H2Exchange::new(1, &mut rec);
        let block = hpack(&[(":status", "200"), ("content-type", "text/plain")]);
        let (first, rest) = block.split_at(2);
        ex.headers_frame_received(1, false, false, Bytes::copy_from_slice(first));
        ex.continuation_frame_received(1, true, Bytes::copy_from_slice(rest));
        ex.data_frame_received(1, false, Bytes::from_static(b"hel"), 3);
        ex.data_frame_received(1, false, Bytes::from_static(b"lo"), 2);
        ex.headers_frame_received(1, true, true, hpack(&[("x-checksum", "abc")]));
        assert!(ex.done);
        assert!(ex.error.is_none());
        drop(ex);
        assert_eq!(
            rec.events,
            vec!["ok 200", "content-type: text/plain", "start", "end", "x-checksum: abc", "complete"]
        );
        assert_eq!(rec.body, b"hello");
    }

    #[test]
    fn h2_exchange_skips_interim_and_reports_redirect() {
        let mut rec = Recorder::default();
        let mut ex = H2Exchange::new(1, &mut rec);
        ex.headers_frame_received(1, false, true, hpack(&[(":status", "100")]));
        ex.headers_frame_received(1, true, true, hpack(&[(":status", "303"), ("location", "/x")]));
        assert!(ex.done);
        drop(ex);
        assert_eq!(rec.events, vec!["error 303", "location: /x", "complete"]);
    }

    #[test]
    fn h2_exchange_flow_control_and_settings() {
        let mut rec = Recorder::default();
        let mut ex = H2Exchange::new(1, &mut rec);
        assert_eq!(ex.send_capacity(), DEFAULT_MAX_FRAME_SIZE);
        ex.settings_frame_received(false, vec![(SETTINGS_INITIAL_WINDOW_SIZE, 100)]);
        assert_eq!(ex.send_capacity(), 100);
        ex.consume_send_window(100);
        assert_eq!(ex.send_capacity(), 0);
        ex.window_update_frame_received(1, 50);
        assert_eq!(ex.send_capacity(), 50);
        // SETTINGS ACK was queued
        assert!(!ex.writer.is_empty());
    }

    #[test]
    fn h2_exchange_replenishes_receive_window() {
        let mut rec = Recorder::default();
        let mut ex = H2Exchange::new(1, &mut rec);
        ex.headers_frame_received(1, false, true, hpack(&[(":status", "200")]));
        let big = Bytes::from(vec![0u8; WINDOW_UPDATE_THRESHOLD as usize]);
        ex.data_frame_received(1, false, big, WINDOW_UPDATE_THRESHOLD);
        let frames = ex.writer.take_buffer();
        // connection and stream WINDOW_UPDATE
        assert_eq!(frames.len(), 2 * 13);
        assert_eq!(frames[3], crate::protocol::http::h2::TYPE_WINDOW_UPDATE);
    }

    #[test]
    fn h2_exchange_errors() {
        let mut rec = Recorder::default();
        let mut ex = H2Exchange::new(1, &mut rec);
        ex.rst_stream_frame_received(1, 0x8);
        let err = ex.error.take().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(err.to_string().contains("CANCEL"));

        ex.goaway_frame_received(0, 0x2, Bytes::from_static(b"bye"));
        let err = ex.error.take().unwrap();
        assert!(err.to_string().contains("INTERNAL_ERROR bye"));

        ex.data_frame_received(1, false, Bytes::from_static(b"x"), 1);
        assert!(ex.error.is_some());
    }
}
