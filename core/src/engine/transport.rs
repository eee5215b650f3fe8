/*
 * transport.rs
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

//! One hop of a request: connect (through the proxy and TLS as configured), send the prepared
//! request and collect the complete response.

use std::mem;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::engine::spec::{Entity, PreparedRequest};
use crate::error::{RequestError, Result, TimeoutPhase};
use crate::net::TransportContext;
use crate::protocol::http::{
    Endpoint, HttpClient, HttpVersion, RequestBody, RequestBuilder, Response, ResponseHandler, Timeouts,
    TlsSetup,
};
use crate::uri;

/// A complete response as received, before mapping.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub reason: Option<String>,
    /// Fields (then trailers) in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub version: HttpVersion,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Buffers the response events of one exchange.
#[derive(Default)]
struct ResponseCollector {
    response: Option<Response>,
    headers: Vec<(String, String)>,
    body: BytesMut,
    complete: bool,
}

impl ResponseHandler for ResponseCollector {
    fn ok(&mut self, response: Response) {
        self.response = Some(response);
    }

    fn error(&mut self, response: Response) {
        self.response = Some(response);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn end_body(&mut self) {}

    fn complete(&mut self) {
        self.complete = true;
    }
}

fn endpoint(request: &PreparedRequest) -> Result<Endpoint> {
    let url = &request.url;
    let host = url
        .host_str()
        .ok_or_else(|| RequestError::invalid("url", "has no host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| RequestError::invalid("url", "has no port"))?;
    Ok(Endpoint {
        host,
        port,
        secure: url.scheme() == "https",
    })
}

/// Build the wire request for this hop. A stream entity is moved out and left `Consumed`.
fn build_request(request: &mut PreparedRequest, endpoint: &Endpoint) -> RequestBuilder {
    let url = &request.url;
    let mut wire = RequestBuilder::new(
        request.method.clone(),
        url.scheme(),
        uri::authority(url),
        uri::origin_form(url),
    );
    for (name, value) in request.headers.iter() {
        wire.header(name, value);
    }
    if let Some(credentials) = &request.authorization {
        if !request.headers.contains("Authorization") {
            wire.header("Authorization", credentials.as_str());
        }
    }
    // Plaintext through a proxy is forwarded; secure targets are tunnelled by the client.
    if let Some(proxy) = request.proxy.as_ref().filter(|_| !endpoint.secure) {
        wire.absolute_form();
        if let Some(credentials) = proxy.authorization() {
            wire.header("Proxy-Authorization", credentials);
        }
    }
    let body = match mem::replace(&mut request.entity, Entity::None) {
        Entity::None => RequestBody::Empty,
        Entity::Bytes(b) => {
            request.entity = Entity::Bytes(b.clone());
            RequestBody::Bytes(b)
        }
        Entity::Stream(reader) => {
            request.entity = Entity::Consumed;
            RequestBody::Stream(reader)
        }
        Entity::Consumed => {
            request.entity = Entity::Consumed;
            RequestBody::Empty
        }
    };
    wire.body(body);
    wire
}

/// Perform one request/response exchange for `request` as it currently stands.
pub(crate) async fn exchange(context: &mut TransportContext, request: &mut PreparedRequest) -> Result<RawResponse> {
    let endpoint = endpoint(request)?;
    let tls = if endpoint.secure {
        let preferred = context.tls_config()?;
        let fallback = if context.disable_http2() {
            None
        } else {
            Some(context.http1_tls_config()?)
        };
        Some(TlsSetup { preferred, fallback })
    } else {
        None
    };
    let timeouts = Timeouts {
        connect: request.connect_timeout,
        read: request.read_timeout,
    };

    let mut connection = HttpClient::connect(&endpoint, request.proxy.as_ref(), tls.as_ref(), timeouts)
        .await
        .map_err(|e| RequestError::from_io(e, TimeoutPhase::Connect))?;
    let version = connection.version();
    let wire = build_request(request, &endpoint);
    trace!(target_form = %wire.target, headers = wire.headers.len(), "sending request");

    let mut collector = ResponseCollector::default();
    connection
        .send(wire, &mut collector)
        .await
        .map_err(|e| RequestError::from_io(e, TimeoutPhase::Read))?;

    let response = match collector.response {
        Some(r) if collector.complete => r,
        _ => {
            return Err(RequestError::from_io(
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed before response completed"),
                TimeoutPhase::Read,
            ))
        }
    };
    debug!(url = %request.url, %version, status = response.code, "response received");
    Ok(RawResponse {
        status: response.code,
        reason: response.reason,
        headers: collector.headers,
        body: collector.body.freeze(),
        version,
    })
}
