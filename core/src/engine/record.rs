/*
 * record.rs
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

//! Response mapping: the final raw response becomes a [`ResponseRecord`] with grouped
//! headers, the body decoded as text when the media type allows it, and a single-use body
//! stream.

use std::fmt;
use std::io::{self, Read};

use bytes::{Buf, Bytes};
use encoding_rs::{Encoding, UTF_8};
use http::StatusCode;
use url::Url;

use crate::engine::transport::RawResponse;
use crate::mime::parse_content_type;
use crate::protocol::http::HttpVersion;

/// Normalized outcome of a request.
pub struct ResponseRecord {
    pub status: u16,
    /// Reason phrase sent by the server, else the canonical one for `status`.
    pub message: String,
    /// Grouped by name in arrival order; the first-seen casing names the group.
    pub headers: Vec<(String, Vec<String>)>,
    pub content_type: Option<String>,
    /// Entity decoded as text; `None` unless the media type is text-like.
    pub body: Option<String>,
    /// Final URL after redirects.
    pub url: Url,
    pub version: HttpVersion,
    body_stream: Option<BodyStream>,
}

impl ResponseRecord {
    pub(crate) fn from_raw(raw: RawResponse, url: Url) -> Self {
        let RawResponse {
            status,
            reason,
            headers: raw_headers,
            body: entity,
            version,
        } = raw;

        let mut headers: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in raw_headers {
            match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                Some((_, values)) => values.push(value),
                None => headers.push((name, vec![value])),
            }
        }

        let content_type = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, v)| v.first().cloned());
        let body = content_type.as_deref().and_then(|ct| decode_text(ct, &entity));
        let message = reason
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| canonical_reason(status).to_string());

        Self {
            status,
            message,
            headers,
            content_type,
            body,
            url,
            version,
            body_stream: Some(BodyStream::new(entity)),
        }
    }

    /// All values of header `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// First value of header `name`.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// The raw entity. Available once; `None` afterwards.
    pub fn take_body_stream(&mut self) -> Option<BodyStream> {
        self.body_stream.take()
    }
}

impl fmt::Debug for ResponseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseRecord")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("url", &self.url.as_str())
            .field("version", &self.version)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers.len())
            .finish_non_exhaustive()
    }
}

/// Response entity as a reader, positioned at the first byte.
#[derive(Debug)]
pub struct BodyStream {
    remaining: Bytes,
}

impl BodyStream {
    fn new(entity: Bytes) -> Self {
        Self { remaining: entity }
    }

    /// Bytes not yet read.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Remaining bytes without copying.
    pub fn into_bytes(self) -> Bytes {
        self.remaining
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining.len());
        self.remaining.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

pub fn canonical_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Decode `entity` if `content_type` names a text-like media type. The charset parameter
/// selects the decoder; a missing or unknown label means UTF-8. Malformed sequences are
/// replaced.
fn decode_text(content_type: &str, entity: &[u8]) -> Option<String> {
    let ct = parse_content_type(content_type)?;
    if !ct.is_text_like() {
        return None;
    }
    let encoding = ct
        .charset()
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(entity);
    Some(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, reason: Option<&str>, headers: &[(&str, &str)], body: &[u8]) -> RawResponse {
        RawResponse {
            status,
            reason: reason.map(str::to_string),
            headers: headers.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect(),
            body: Bytes::copy_from_slice(body),
            version: HttpVersion::Http1_1,
        }
    }

    fn url() -> Url {
        Url::parse("http://x.test/final").unwrap()
    }

    #[test]
    fn json_body_is_text_and_stream() {
        let mut rec = ResponseRecord::from_raw(
            raw(200, Some("OK"), &[("Content-Type", "application/json")], br#"{"a":1}"#),
            url(),
        );
        assert_eq!(rec.status, 200);
        assert_eq!(rec.message, "OK");
        assert_eq!(rec.content_type.as_deref(), Some("application/json"));
        assert_eq!(rec.body.as_deref(), Some(r#"{"a":1}"#));
        let mut s = String::new();
        rec.take_body_stream().unwrap().read_to_string(&mut s).unwrap();
        assert_eq!(s, r#"{"a":1}"#);
        assert!(rec.take_body_stream().is_none());
    }

    #[test]
    fn binary_body_has_no_text() {
        let mut rec = ResponseRecord::from_raw(
            raw(200, None, &[("content-type", "image/png")], &[0x89, b'P', b'N', b'G']),
            url(),
        );
        assert!(rec.body.is_none());
        assert_eq!(rec.take_body_stream().unwrap().into_bytes().len(), 4);
    }

    #[test]
    fn charset_parameter_selects_decoder() {
        let rec = ResponseRecord::from_raw(
            raw(200, None, &[("Content-Type", "text/plain; charset=ISO-8859-1")], &[b'c', 0xE9]),
            url(),
        );
        assert_eq!(rec.body.as_deref(), Some("c\u{e9}"));

        let rec = ResponseRecord::from_raw(
            raw(200, None, &[("Content-Type", "text/plain; charset=no-such-charset")], "é".as_bytes()),
            url(),
        );
        assert_eq!(rec.body.as_deref(), Some("é"));
    }

    #[test]
    fn headers_grouped_in_arrival_order() {
        let rec = ResponseRecord::from_raw(
            raw(
                302,
                None,
                &[("Set-Cookie", "a=1"), ("Location", "/x"), ("set-cookie", "b=2")],
                b"",
            ),
            url(),
        );
        assert_eq!(rec.headers.len(), 2);
        assert_eq!(rec.headers[0].0, "Set-Cookie");
        assert_eq!(rec.header("SET-COOKIE").unwrap(), &["a=1".to_string(), "b=2".to_string()]);
        assert_eq!(rec.first_header("location"), Some("/x"));
        assert_eq!(rec.message, "Found");
        assert!(rec.content_type.is_none());
        assert!(rec.body.is_none());
    }

    #[test]
    fn unknown_status_has_empty_message() {
        assert_eq!(canonical_reason(599), "");
        assert_eq!(canonical_reason(404), "Not Found");
    }
}
