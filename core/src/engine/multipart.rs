/*
 * multipart.rs
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

//! multipart/form-data (RFC 7578): encoding with a collision-checked random boundary, and a
//! parser that recovers the parts of an encoded body.

use bytes::{BufMut, Bytes, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Read;

use crate::engine::spec::{Body, PartSpec};
use crate::error::{RequestError, Result};
use crate::mime::{is_valid_boundary, parse_content_disposition, ContentDisposition};

const BOUNDARY_PREFIX: &str = "----httpcall-";
const BOUNDARY_RANDOM_LEN: usize = 24;
const MAX_BOUNDARY_ATTEMPTS: usize = 8;

/// An encoded multipart body and its boundary.
#[derive(Debug, Clone)]
pub struct Multipart {
    pub boundary: String,
    pub body: Bytes,
}

impl Multipart {
    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// A part recovered by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Part with its value materialized and its header section serialized.
struct EncodedPart {
    head: String,
    data: Bytes,
}

pub fn random_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", BOUNDARY_PREFIX, suffix)
}

/// Encode parts with a random boundary.
pub fn encode(parts: Vec<PartSpec>) -> Result<Multipart> {
    encode_with(parts, random_boundary)
}

/// Encode parts, drawing boundary candidates from `next_boundary` until one does not occur in
/// any part.
pub fn encode_with(parts: Vec<PartSpec>, mut next_boundary: impl FnMut() -> String) -> Result<Multipart> {
    let parts = parts
        .into_iter()
        .map(materialize)
        .collect::<Result<Vec<_>>>()?;

    let boundary = (0..MAX_BOUNDARY_ATTEMPTS)
        .map(|_| next_boundary())
        .find(|candidate| {
            is_valid_boundary(candidate)
                && !parts.iter().any(|p| {
                    contains(p.data.as_ref(), candidate.as_bytes()) || p.head.contains(candidate.as_str())
                })
        })
        .ok_or_else(|| {
            RequestError::encoding(format!(
                "no collision-free multipart boundary after {} attempts",
                MAX_BOUNDARY_ATTEMPTS
            ))
        })?;

    let size: usize = parts.iter().map(|p| p.head.len() + p.data.len() + boundary.len() + 8).sum();
    let mut body = BytesMut::with_capacity(size + boundary.len() + 6);
    for part in &parts {
        body.put_slice(b"--");
        body.put_slice(boundary.as_bytes());
        body.put_slice(b"\r\n");
        body.put_slice(part.head.as_bytes());
        body.put_slice(b"\r\n");
        body.put_slice(&part.data);
        body.put_slice(b"\r\n");
    }
    body.put_slice(b"--");
    body.put_slice(boundary.as_bytes());
    body.put_slice(b"--\r\n");

    Ok(Multipart {
        boundary,
        body: body.freeze(),
    })
}

fn materialize(part: PartSpec) -> Result<EncodedPart> {
    let PartSpec {
        name,
        value,
        file_name,
        content_type,
    } = part;
    let header_text = [Some(name.as_str()), file_name.as_deref(), content_type.as_deref()];
    if header_text.iter().flatten().any(|s| s.contains(['\r', '\n'])) {
        return Err(RequestError::encoding(format!(
            "line break in headers of multipart part `{}`",
            name.escape_debug()
        )));
    }

    let data = match value {
        Body::Text(s) => Bytes::from(s.into_bytes()),
        Body::Bytes(b) => b,
        Body::Reader(mut r) => {
            let mut buf = Vec::new();
            r.read_to_end(&mut buf).map_err(|e| {
                RequestError::encoding(format!("cannot read multipart part `{}`: {}", name, e))
            })?;
            Bytes::from(buf)
        }
    };

    let disposition = ContentDisposition::form_data(&name, file_name.as_deref());
    let mut head = format!("Content-Disposition: {}\r\n", disposition.to_header_value());
    if let Some(ct) = &content_type {
        head.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    Ok(EncodedPart { head, data })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle, 0).is_some()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn malformed(reason: &str) -> RequestError {
    RequestError::encoding(format!("malformed multipart body: {}", reason))
}

/// Split a multipart/form-data body into its parts.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<ParsedPart>> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let close = [&b"\r\n"[..], delimiter].concat();

    // The first delimiter may be preceded by a preamble.
    let mut at = if body.starts_with(delimiter) {
        delimiter.len()
    } else {
        find(body, &close, 0).ok_or_else(|| malformed("no opening delimiter"))? + close.len()
    };

    let mut parts = Vec::new();
    loop {
        if body[at..].starts_with(b"--") {
            return Ok(parts);
        }
        // transport padding, then CRLF
        while matches!(body.get(at), Some(b' ') | Some(b'\t')) {
            at += 1;
        }
        if !body[at..].starts_with(b"\r\n") {
            return Err(malformed("delimiter not followed by CRLF"));
        }
        at += 2;

        let head_end = find(body, b"\r\n\r\n", at)
            .map(|i| i + 2)
            .or_else(|| body[at..].starts_with(b"\r\n").then_some(at))
            .ok_or_else(|| malformed("unterminated part headers"))?;
        let head = std::str::from_utf8(&body[at..head_end]).map_err(|_| malformed("part headers are not UTF-8"))?;
        let data_start = head_end + 2;
        let data_end = find(body, &close, data_start).ok_or_else(|| malformed("missing closing delimiter"))?;

        let mut disposition = None;
        let mut content_type = None;
        for line in head.split("\r\n").filter(|l| !l.is_empty()) {
            let Some((field, value)) = line.split_once(':') else {
                return Err(malformed("bad part header line"));
            };
            if field.trim().eq_ignore_ascii_case("content-disposition") {
                disposition = parse_content_disposition(value);
            } else if field.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }
        let disposition = disposition
            .filter(|d| d.is_disposition_type("form-data"))
            .ok_or_else(|| malformed("part without form-data disposition"))?;
        let name = disposition
            .parameter("name")
            .ok_or_else(|| malformed("part without name"))?
            .to_string();

        parts.push(ParsedPart {
            name,
            file_name: disposition.parameter("filename").map(str::to_string),
            content_type,
            data: Bytes::copy_from_slice(&body[data_start..data_end]),
        });
        at = data_end + close.len();
    }
}
