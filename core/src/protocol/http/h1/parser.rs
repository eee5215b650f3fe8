/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked, or
//! read-until-close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Upper bound for a status line, header line or chunk-size line.
const MAX_LINE: usize = 64 * 1024;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to its
/// `ResponseHandler`.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the caller decides the body framing with `set_body_mode()`.
    HeadersComplete,
    Body,
    UntilClose,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
}

/// How the response body is delimited (RFC 9112 §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body (HEAD, 1xx, 204, 304, or Content-Length: 0).
    Empty,
    Length(u64),
    Chunked,
    /// Body ends when the server closes the connection.
    UntilClose,
}

/// Push parser for an HTTP/1.1 response. Feed bytes via `receive`; the handler is invoked as
/// complete tokens are parsed and partial data stays in the buffer.
pub struct ResponseParser {
    state: ParseState,
    remaining: u64,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Prepare for the next response on the same buffer (e.g. after a 100 Continue).
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.remaining = 0;
    }

    fn take_line(buf: &mut BytesMut) -> io::Result<Option<BytesMut>> {
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(n) => {
                let mut line = buf.split_to(n + 2);
                line.truncate(n);
                Ok(Some(line))
            }
            None if buf.len() > MAX_LINE => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "HTTP/1.1 line too long",
            )),
            None => Ok(None),
        }
    }

    fn split_field(line: &[u8]) -> io::Result<Option<(String, String)>> {
        let line = std::str::from_utf8(line)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid header UTF-8"))?;
        Ok(line
            .find(':')
            .map(|colon| (line[..colon].trim().to_string(), line[colon + 1..].trim().to_string())))
    }

    /// Consume and parse as much as possible from buf.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> io::Result<()> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        continue; // tolerate stray CRLF between responses
                    }
                    let line = std::str::from_utf8(&line).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid status line UTF-8")
                    })?;
                    // HTTP/1.1 200 OK, or HTTP/1.1 200
                    let mut parts = line.splitn(3, ' ');
                    let version = parts.next().unwrap_or("");
                    if !version.starts_with("HTTP/") {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("malformed status line: {}", line),
                        ));
                    }
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .filter(|c| (100..=999).contains(c))
                        .ok_or_else(|| {
                            io::Error::new(io::ErrorKind::InvalidData, "malformed status code")
                        })?;
                    let reason = parts.next().map(str::trim).filter(|r| !r.is_empty());
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = Self::split_field(&line)? {
                        handler.header(&name, &value);
                    }
                }
                ParseState::HeadersComplete | ParseState::Idle => return Ok(()),
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = (self.remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.finish(handler);
                    }
                }
                ParseState::UntilClose => {
                    if !buf.is_empty() {
                        let chunk = buf.split();
                        handler.body_chunk(&chunk);
                    }
                    return Ok(());
                }
                ParseState::ChunkSize => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    let line = std::str::from_utf8(&line).unwrap_or("");
                    let hex = line.split(';').next().unwrap_or("").trim();
                    self.remaining = u64::from_str_radix(hex, 16).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size")
                    })?;
                    self.state = if self.remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let n = (self.remaining.min(buf.len() as u64)) as usize;
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.remaining -= n as u64;
                    if self.remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "missing CRLF after chunk data",
                        ));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = Self::take_line(buf)? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else if let Some((name, value)) = Self::split_field(&line)? {
                        handler.trailer(&name, &value);
                    }
                }
            }
        }
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        handler.complete();
        self.state = ParseState::Idle;
    }

    /// Called after headers (state HeadersComplete) once the caller knows the body framing.
    pub fn set_body_mode<H: H1ResponseHandler>(&mut self, mode: BodyMode, handler: &mut H) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        match mode {
            BodyMode::Empty | BodyMode::Length(0) => self.finish(handler),
            BodyMode::Length(n) => {
                self.remaining = n;
                self.state = ParseState::Body;
            }
            BodyMode::Chunked => self.state = ParseState::ChunkSize,
            BodyMode::UntilClose => self.state = ParseState::UntilClose,
        }
    }

    /// The peer closed the connection. Completes a read-until-close body; anything else
    /// mid-message is an unexpected EOF.
    pub fn eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.state {
            ParseState::UntilClose => {
                self.finish(handler);
                Ok(())
            }
            ParseState::Idle => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before response was complete",
            )),
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Body framing for a response, from status, request method and headers.
pub fn body_mode(code: u16, head_request: bool, headers: &[(String, String)]) -> BodyMode {
    if head_request || (100..200).contains(&code) || code == 204 || code == 304 {
        return BodyMode::Empty;
    }
    let chunked = headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("transfer-encoding")
            && v.rsplit(',').next().is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
    });
    if chunked {
        return BodyMode::Chunked;
    }
    match headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<u64>().ok())
    {
        Some(n) => BodyMode::Length(n),
        None => BodyMode::UntilClose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        status: Option<(u16, Option<String>)>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        trailers: Vec<(String, String)>,
        complete: bool,
    }

    impl H1ResponseHandler for Events {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header(&mut self, name: &str, value: &str) {
            self.headers.push((name.into(), value.into()));
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn trailer(&mut self, name: &str, value: &str) {
            self.trailers.push((name.into(), value.into()));
        }
        fn complete(&mut self) {
            self.complete = true;
        }
    }

    fn run(input: &[&[u8]], head: bool) -> Events {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::new();
        for piece in input {
            buf.extend_from_slice(piece);
            parser.receive(&mut buf, &mut ev).unwrap();
            if parser.state() == ParseState::HeadersComplete {
                let code = ev.status.as_ref().unwrap().0;
                let mode = body_mode(code, head, &ev.headers);
                parser.set_body_mode(mode, &mut ev);
                parser.receive(&mut buf, &mut ev).unwrap();
            }
        }
        ev
    }

    #[test]
    fn content_length_split_across_reads() {
        let ev = run(
            &[b"HTTP/1.1 200 OK\r\nContent-Le", b"ngth: 5\r\n\r\nhe", b"llo"],
            false,
        );
        assert_eq!(ev.status, Some((200, Some("OK".into()))));
        assert_eq!(ev.body, b"hello");
        assert!(ev.complete);
    }

    #[test]
    fn chunked_with_trailer() {
        let ev = run(
            &[b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;x=y\r\npedia\r\n0\r\nX-Sum: 9\r\n\r\n"],
            false,
        );
        assert_eq!(ev.body, b"Wikipedia");
        assert_eq!(ev.trailers, vec![("X-Sum".into(), "9".into())]);
        assert!(ev.complete);
    }

    #[test]
    fn head_has_no_body() {
        let ev = run(&[b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n"], true);
        assert!(ev.complete);
        assert!(ev.body.is_empty());
    }

    #[test]
    fn missing_reason_phrase() {
        let ev = run(&[b"HTTP/1.1 204\r\n\r\n"], false);
        assert_eq!(ev.status, Some((204, None)));
        assert!(ev.complete);
    }

    #[test]
    fn until_close_completes_on_eof() {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut ev).unwrap();
        parser.set_body_mode(body_mode(200, false, &ev.headers), &mut ev);
        parser.receive(&mut buf, &mut ev).unwrap();
        assert!(!ev.complete);
        parser.eof(&mut ev).unwrap();
        assert!(ev.complete);
        assert_eq!(ev.body, b"abc");
    }

    #[test]
    fn eof_mid_body_is_error() {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 9\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut ev).unwrap();
        parser.set_body_mode(body_mode(200, false, &ev.headers), &mut ev);
        parser.receive(&mut buf, &mut ev).unwrap();
        let err = parser.eof(&mut ev).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn bad_status_line_is_error() {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n"[..]);
        assert!(parser.receive(&mut buf, &mut ev).is_err());
    }

    #[test]
    fn body_mode_rules() {
        let h = |k: &str, v: &str| vec![(k.to_string(), v.to_string())];
        assert_eq!(body_mode(304, false, &h("Content-Length", "4")), BodyMode::Empty);
        assert_eq!(body_mode(101, false, &[]), BodyMode::Empty);
        assert_eq!(body_mode(200, false, &h("transfer-encoding", "gzip, chunked")), BodyMode::Chunked);
        assert_eq!(body_mode(200, false, &h("content-length", " 12 ")), BodyMode::Length(12));
        assert_eq!(body_mode(200, false, &[]), BodyMode::UntilClose);
    }
}
