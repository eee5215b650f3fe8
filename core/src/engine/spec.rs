/*
 * spec.rs
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

//! Request model: the caller-facing `RequestSpec`, its builder, and validation into a
//! `PreparedRequest` that the transport can send hop after hop.

use bytes::Bytes;
use std::fmt;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::config::EngineConfig;
use crate::engine::{body, multipart};
use crate::error::{RequestError, Result};
use crate::mime::{is_token, parse_content_type};
use crate::protocol::http::{basic_credentials, Method, ProxyEndpoint};
use crate::uri;

/// A parameter that may carry one value or several (`string | string[]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            ParamValue::Single(v) => std::slice::from_ref(v),
            ParamValue::Multi(v) => v,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Single(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Single(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::Multi(v)
    }
}

impl From<&[&str]> for ParamValue {
    fn from(v: &[&str]) -> Self {
        ParamValue::Multi(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ParamValue {
    fn from(v: [&str; N]) -> Self {
        ParamValue::Multi(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Flatten ordered `(key, value|values)` entries into `(key, value)` pairs.
pub(crate) fn flatten(params: &[(String, ParamValue)]) -> impl Iterator<Item = (&str, &str)> {
    params
        .iter()
        .flat_map(|(k, v)| v.values().map(move |value| (k.as_str(), value)))
}

/// Request body or multipart part value: text, bytes, or a stream read on send.
pub enum Body {
    Text(String),
    Bytes(Bytes),
    Reader(Box<dyn Read + Send>),
}

impl Body {
    pub fn reader(r: impl Read + Send + 'static) -> Self {
        Body::Reader(Box::new(r))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Text(s) => write!(f, "Text({} chars)", s.chars().count()),
            Body::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Body::Reader(_) => f.write_str("Reader"),
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(b))
    }
}

impl From<&'static [u8]> for Body {
    fn from(b: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(b))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

/// One multipart/form-data part.
#[derive(Debug)]
pub struct PartSpec {
    pub name: String,
    pub value: Body,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl PartSpec {
    pub fn new(name: impl Into<String>, value: impl Into<Body>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Basic authentication credentials, sent preemptively.
#[derive(Clone, PartialEq, Eq)]
pub struct Auth {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth").field("user", &self.user).finish_non_exhaustive()
    }
}

/// HTTP proxy. Secure targets are tunnelled with CONNECT, plaintext targets forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySpec {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ProxySpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

/// Everything describing one call. Built once, validated, then consumed by the engine.
#[derive(Debug)]
pub struct RequestSpec {
    pub url: String,
    pub method: Method,
    pub query_params: Vec<(String, ParamValue)>,
    pub form_params: Vec<(String, ParamValue)>,
    pub headers: Vec<(String, ParamValue)>,
    pub body: Option<Body>,
    pub content_type: Option<String>,
    pub multipart: Vec<PartSpec>,
    pub auth: Option<Auth>,
    pub proxy: Option<ProxySpec>,
    pub disable_http2: bool,
    /// `None` uses `EngineConfig::default_connection_timeout_ms`.
    pub connection_timeout_ms: Option<u64>,
    /// `None` uses `EngineConfig::default_read_timeout_ms`.
    pub read_timeout_ms: Option<u64>,
    pub follow_redirects: bool,
    /// PEM certificate authorities replacing the default trust anchors.
    pub certificates: Option<Vec<u8>>,
    /// PEM private key plus certificate chain presented as the client identity.
    pub client_certificate: Option<Vec<u8>>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: Method::Get,
            query_params: Vec::new(),
            form_params: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
            multipart: Vec::new(),
            auth: None,
            proxy: None,
            disable_http2: false,
            connection_timeout_ms: None,
            read_timeout_ms: None,
            follow_redirects: true,
            certificates: None,
            client_certificate: None,
        }
    }
}

impl RequestSpec {
    pub fn builder(url: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder {
            spec: RequestSpec {
                url: url.into(),
                ..RequestSpec::default()
            },
        }
    }

    /// Check every field and resolve the entity. Pure apart from reading multipart stream
    /// parts; nothing touches the network.
    pub fn validate(self, config: &EngineConfig) -> Result<PreparedRequest> {
        let url_text = self.url.trim();
        if url_text.is_empty() {
            return Err(RequestError::invalid("url", "is required"));
        }
        let mut url = Url::parse(url_text).map_err(|e| RequestError::invalid("url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::invalid(
                "url",
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RequestError::invalid("url", "has no host"));
        }
        url.set_fragment(None);

        let mut headers = Headers::new();
        for (name, value) in flatten(&self.headers) {
            if !is_token(name) {
                return Err(RequestError::invalid("headers", format!("invalid header name `{}`", name)));
            }
            if value.contains(['\r', '\n']) {
                return Err(RequestError::invalid("headers", format!("header `{}` contains a line break", name)));
            }
            headers.append(name, value);
        }

        let proxy = match self.proxy {
            Some(p) if p.host.trim().is_empty() => {
                return Err(RequestError::invalid("proxy.host", "is required"));
            }
            Some(p) if p.port == 0 => return Err(RequestError::invalid("proxy.port", "must be non-zero")),
            Some(p) => Some(ProxyEndpoint {
                host: p.host.trim().trim_start_matches('[').trim_end_matches(']').to_string(),
                port: p.port,
                user: p.user,
                password: p.password,
            }),
            None => None,
        };

        let connect_timeout = timeout("connectionTimeoutMs", self.connection_timeout_ms, config.default_connection_timeout_ms)?;
        let read_timeout = timeout("readTimeoutMs", self.read_timeout_ms, config.default_read_timeout_ms)?;

        if let Some(ct) = &self.content_type {
            if parse_content_type(ct).is_none() {
                return Err(RequestError::invalid("contentType", format!("malformed media type `{}`", ct)));
            }
        }
        for (i, part) in self.multipart.iter().enumerate() {
            if part.name.trim().is_empty() {
                return Err(RequestError::invalid(format!("multipart[{}].name", i), "is required"));
            }
        }

        if !self.query_params.is_empty() {
            uri::append_query(&mut url, &uri::encode_form_pairs(flatten(&self.query_params)));
        }
        // GET/HEAD without an explicit body or multipart parts carry form parameters in the
        // query string, unless the caller already supplied query parameters.
        let fold_form = self.method.is_get_or_head()
            && self.body.is_none()
            && self.multipart.is_empty()
            && self.query_params.is_empty()
            && !self.form_params.is_empty();
        if fold_form {
            uri::append_query(&mut url, &body::encode_form(&self.form_params));
        }

        let entity = if let Some(b) = self.body {
            let inferred = body::infer_content_type(&b);
            set_content_type(&mut headers, self.content_type.as_deref().unwrap_or(inferred));
            body::explicit(b)
        } else if !self.multipart.is_empty() {
            let encoded = multipart::encode(self.multipart)?;
            headers.set("Content-Type", &encoded.content_type());
            Entity::Bytes(encoded.body)
        } else if !self.form_params.is_empty() && !fold_form {
            set_content_type(
                &mut headers,
                self.content_type.as_deref().unwrap_or(body::FORM_CONTENT_TYPE),
            );
            Entity::Bytes(Bytes::from(body::encode_form(&self.form_params)))
        } else {
            Entity::None
        };

        if !headers.contains("User-Agent") {
            headers.append("User-Agent", &config.user_agent());
        }
        let authorization = self.auth.map(|a| basic_credentials(&a.user, &a.password));

        Ok(PreparedRequest {
            url,
            method: self.method,
            headers,
            entity,
            authorization,
            proxy,
            disable_http2: self.disable_http2,
            connect_timeout,
            read_timeout,
            follow_redirects: self.follow_redirects,
            certificates: self.certificates,
            client_certificate: self.client_certificate,
        })
    }
}

fn timeout(field: &str, value: Option<u64>, default_ms: u64) -> Result<Duration> {
    match value.unwrap_or(default_ms) {
        0 => Err(RequestError::invalid(field, "must be greater than zero")),
        ms => Ok(Duration::from_millis(ms)),
    }
}

/// A `Content-Type` given in the headers wins over `contentType` and inference.
fn set_content_type(headers: &mut Headers, value: &str) {
    if !headers.contains("Content-Type") {
        headers.append("Content-Type", value);
    }
}

/// Fluent construction of a `RequestSpec`.
#[derive(Debug)]
#[must_use]
pub struct RequestSpecBuilder {
    spec: RequestSpec,
}

impl RequestSpecBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.spec.method = method;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.spec.query_params.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.spec.form_params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.spec.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.spec.body = Some(body.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.spec.content_type = Some(content_type.into());
        self
    }

    pub fn part(mut self, part: PartSpec) -> Self {
        self.spec.multipart.push(part);
        self
    }

    pub fn auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.spec.auth = Some(Auth {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn proxy(mut self, proxy: ProxySpec) -> Self {
        self.spec.proxy = Some(proxy);
        self
    }

    pub fn disable_http2(mut self, disable: bool) -> Self {
        self.spec.disable_http2 = disable;
        self
    }

    pub fn connection_timeout_ms(mut self, ms: u64) -> Self {
        self.spec.connection_timeout_ms = Some(ms);
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.spec.read_timeout_ms = Some(ms);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.spec.follow_redirects = follow;
        self
    }

    pub fn certificates(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.spec.certificates = Some(pem.into());
        self
    }

    pub fn client_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.spec.client_certificate = Some(pem.into());
        self
    }

    pub fn build(self) -> RequestSpec {
        self.spec
    }
}

/// Ordered header list. Original casing is kept for the wire; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.0.push((name.to_string(), value.to_string()));
    }

    /// Replace every field named `name` with a single one, at the position of the first.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(i) => {
                self.0[i].1 = value.to_string();
                let mut seen = 0;
                self.0.retain(|(k, _)| {
                    if k.eq_ignore_ascii_case(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.append(name, value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolved request entity.
pub enum Entity {
    None,
    /// Replayable across redirect hops.
    Bytes(Bytes),
    /// Sent once; becomes `Consumed` after the first hop.
    Stream(Box<dyn Read + Send>),
    Consumed,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::None => f.write_str("None"),
            Entity::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Entity::Stream(_) => f.write_str("Stream"),
            Entity::Consumed => f.write_str("Consumed"),
        }
    }
}

/// A validated request, owned by the engine for the duration of one call.
#[derive(Debug)]
pub struct PreparedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: Headers,
    pub entity: Entity,
    /// `Authorization` value from `auth`, applied to hops on the original host.
    pub authorization: Option<String>,
    pub proxy: Option<ProxyEndpoint>,
    pub disable_http2: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub follow_redirects: bool,
    pub certificates: Option<Vec<u8>>,
    pub client_certificate: Option<Vec<u8>>,
}
