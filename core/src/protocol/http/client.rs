/*
 * client.rs
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

//! HTTP client: open a connection to an endpoint (directly or through a proxy), negotiate TLS
//! and the protocol version, and hand back an `HttpConnection`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{AlertDescription, ClientConfig};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::net::ALPN_H2;
use crate::protocol::http::connection::{HttpConnection, HttpStream, HttpVersion};
use crate::protocol::http::proxy::{self, ProxyEndpoint};

/// Target origin of one hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Endpoint {
    /// `host:port` as used in CONNECT, with brackets around IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// TLS client configs for a secure hop: the preferred ALPN offer and, when it includes `h2`,
/// an HTTP/1.1-only config to retry with if the server rejects the offer.
#[derive(Clone)]
pub struct TlsSetup {
    pub preferred: Arc<ClientConfig>,
    pub fallback: Option<Arc<ClientConfig>>,
}

/// Connection timeouts for one hop.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// DNS, TCP connect, proxy CONNECT and TLS handshake together.
    pub connect: Duration,
    /// Each read or write on the established connection.
    pub read: Duration,
}

/// HTTP client. `HttpClient::connect` returns a connection ready for one request.
pub struct HttpClient;

impl HttpClient {
    /// Connect to `endpoint`, through `proxy` if given. Secure endpoints perform a TLS
    /// handshake with `tls` and use HTTP/2 when the server selects `h2` via ALPN; plaintext
    /// always uses HTTP/1.1.
    pub async fn connect(
        endpoint: &Endpoint,
        proxy: Option<&ProxyEndpoint>,
        tls: Option<&TlsSetup>,
        timeouts: Timeouts,
    ) -> io::Result<HttpConnection> {
        let attempt = async {
            let Some(setup) = tls else {
                let tcp = open(endpoint, proxy).await?;
                return Ok::<_, io::Error>((HttpStream::Plain(tcp), HttpVersion::Http1_1));
            };
            match handshake(endpoint, proxy, setup.preferred.clone()).await {
                Err(e) if setup.fallback.is_some() && alpn_refused(&e) => {
                    tracing::debug!(host = %endpoint.host, "ALPN offer refused, retrying with HTTP/1.1 only");
                    let fallback = setup.fallback.clone().unwrap_or_else(|| setup.preferred.clone());
                    handshake(endpoint, proxy, fallback).await
                }
                other => other,
            }
        };
        let (stream, version) = match timeout(timeouts.connect, attempt).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
            }
        };
        tracing::debug!(host = %endpoint.host, port = endpoint.port, %version, "connected");
        Ok(HttpConnection::new(stream, version, timeouts.read))
    }
}

/// TCP connection to the endpoint, or to the proxy (with a CONNECT tunnel for secure
/// endpoints).
async fn open(endpoint: &Endpoint, proxy: Option<&ProxyEndpoint>) -> io::Result<TcpStream> {
    let (host, port) = match proxy {
        Some(p) => (p.host.as_str(), p.port),
        None => (endpoint.host.as_str(), endpoint.port),
    };
    let mut tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;
    if let Some(p) = proxy {
        if endpoint.secure {
            let authorization = p.authorization();
            proxy::tunnel(&mut tcp, &endpoint.authority(), authorization.as_deref()).await?;
        }
    }
    Ok(tcp)
}

async fn handshake(
    endpoint: &Endpoint,
    proxy: Option<&ProxyEndpoint>,
    config: Arc<ClientConfig>,
) -> io::Result<(HttpStream, HttpVersion)> {
    let server_name = ServerName::try_from(endpoint.host.as_str())
        .map(|name| name.to_owned())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
    let tcp = open(endpoint, proxy).await?;
    let tls = TlsConnector::from(config).connect(server_name, tcp).await?;
    let version = match tls.get_ref().1.alpn_protocol() {
        Some(p) if p == ALPN_H2 => HttpVersion::Http2,
        _ => HttpVersion::Http1_1,
    };
    Ok((HttpStream::Tls(Box::new(tls)), version))
}

/// The server aborted the handshake because it supports none of the offered protocols.
fn alpn_refused(err: &io::Error) -> bool {
    matches!(
        err.get_ref().and_then(|e| e.downcast_ref::<rustls::Error>()),
        Some(rustls::Error::AlertReceived(AlertDescription::NoApplicationProtocol))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_brackets_ipv6() {
        let v4 = Endpoint { host: "127.0.0.1".into(), port: 8443, secure: true };
        assert_eq!(v4.authority(), "127.0.0.1:8443");
        let v6 = Endpoint { host: "::1".into(), port: 443, secure: true };
        assert_eq!(v6.authority(), "[::1]:443");
    }

    #[test]
    fn alpn_refusal_detection() {
        let refused = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(AlertDescription::NoApplicationProtocol),
        );
        assert!(alpn_refused(&refused));
        let other = io::Error::new(
            io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(AlertDescription::HandshakeFailure),
        );
        assert!(!alpn_refused(&other));
        assert!(!alpn_refused(&io::Error::new(io::ErrorKind::Other, "x")));
    }
}
