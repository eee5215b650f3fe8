/*
 * request.rs
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

//! HTTP request on the wire: method, request-target, headers, body.
//!
//! Built via RequestBuilder; sending is done by the connection (send with handler).

use bytes::Bytes;
use std::fmt;
use std::io::Read;

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Trace,
    /// Extension method, stored upper-cased.
    Other(String),
}

impl Method {
    /// Parse a method name, ignoring case. Names that are not HTTP tokens yield None.
    pub fn parse(name: &str) -> Option<Method> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.is_empty() || !upper.bytes().all(crate::mime::is_token_char) {
            return None;
        }
        Some(match upper.as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            "TRACE" => Method::Trace,
            _ => Method::Other(upper),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Other(s) => s,
        }
    }

    pub fn is_get_or_head(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    /// Methods whose requests normally carry an entity; an empty one is sent with
    /// `Content-Length: 0`.
    pub fn expects_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request entity as handed to the connection.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// In-memory entity, framed with Content-Length.
    Bytes(Bytes),
    /// Streamed entity of unknown length: chunked on HTTP/1.1, DATA frames on HTTP/2.
    Stream(Box<dyn Read + Send>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Mutable request builder: method, target, headers, body.
///
/// `target` is what goes on the HTTP/1.1 request line (origin-form, or absolute-form when
/// forwarding through a proxy); `scheme`, `authority` and `path` feed the HTTP/2
/// pseudo-headers and the `Host` header.
#[derive(Debug)]
pub struct RequestBuilder {
    pub method: Method,
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub target: String,
    /// Ordered; names keep their casing for HTTP/1.1 and are lowercased for HTTP/2.
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestBuilder {
    pub fn new(
        method: Method,
        scheme: impl Into<String>,
        authority: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            method,
            scheme: scheme.into(),
            authority: authority.into(),
            target: path.clone(),
            path,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Use absolute-form on the request line (plaintext proxy forwarding).
    pub fn absolute_form(&mut self) -> &mut Self {
        self.target = format!("{}://{}{}", self.scheme, self.authority, self.path);
        self
    }

    /// Append a header. Repeated names are sent as repeated fields.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn body(&mut self, body: RequestBody) -> &mut Self {
        self.body = body;
        self
    }
}
