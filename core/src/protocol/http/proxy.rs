/*
 * proxy.rs
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

//! HTTP proxy support: `CONNECT` tunnels for secure targets and the credentials used for
//! `Proxy-Authorization` when forwarding plaintext requests.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::http::h1::{H1ResponseHandler, ParseState, ResponseParser};

/// Largest CONNECT response head we are willing to buffer.
const MAX_TUNNEL_RESPONSE: usize = 16 * 1024;

/// `Basic` credentials for an Authorization or Proxy-Authorization header (RFC 7617).
pub fn basic_credentials(user: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, password)))
}

/// Proxy host and optional credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    /// Value for `Proxy-Authorization`, when a user is configured.
    pub fn authorization(&self) -> Option<String> {
        self.user
            .as_deref()
            .map(|user| basic_credentials(user, self.password.as_deref().unwrap_or("")))
    }
}

/// Collects the status line of the proxy's CONNECT response; headers are ignored.
#[derive(Default)]
struct TunnelResponse {
    status: Option<(u16, Option<String>)>,
}

impl H1ResponseHandler for TunnelResponse {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.status = Some((code, reason.map(str::to_string)));
    }
    fn header(&mut self, _name: &str, _value: &str) {}
    fn body_chunk(&mut self, _data: &[u8]) {}
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn complete(&mut self) {}
}

/// Ask the proxy on `stream` to open a tunnel to `authority` (`host:port`). On success the
/// stream carries raw bytes to the target.
pub async fn tunnel<S>(stream: &mut S, authority: &str, proxy_authorization: Option<&str>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n", authority);
    if let Some(credentials) = proxy_authorization {
        request.push_str(&format!("Proxy-Authorization: {}\r\n", credentials));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let mut parser = ResponseParser::new();
    let mut response = TunnelResponse::default();
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        // Read one byte at a time so nothing after the response head is consumed: those bytes
        // belong to the tunnelled connection.
        let mut byte = [0u8; 1];
        if stream.read(&mut byte).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed the connection during CONNECT",
            ));
        }
        buf.extend_from_slice(&byte);
        parser.receive(&mut buf, &mut response)?;
        if parser.state() == ParseState::HeadersComplete {
            break;
        }
        if buf.len() > MAX_TUNNEL_RESPONSE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "proxy CONNECT response too large",
            ));
        }
    }
    match response.status {
        Some((code, _)) if (200..300).contains(&code) => {
            tracing::debug!(authority, code, "proxy tunnel established");
            Ok(())
        }
        Some((code, reason)) => Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!(
                "proxy refused CONNECT to {}: {} {}",
                authority,
                code,
                reason.unwrap_or_default()
            )
            .trim_end()
            .to_string(),
        )),
        None => Err(io::Error::new(io::ErrorKind::InvalidData, "malformed proxy response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn basic_credentials_encoding() {
        assert_eq!(basic_credentials("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        let proxy = ProxyEndpoint {
            host: "proxy".into(),
            port: 3128,
            user: Some("u".into()),
            password: None,
        };
        assert_eq!(proxy.authorization().as_deref(), Some("Basic dTo="));
    }

    #[tokio::test]
    async fn tunnel_success_leaves_trailing_bytes() {
        let (mut client, mut server) = duplex(4096);
        let proxy = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut byte = [0u8; 1];
            while !seen.ends_with(b"\r\n\r\n") {
                server.read_exact(&mut byte).await.unwrap();
                seen.push(byte[0]);
            }
            server
                .write_all(b"HTTP/1.1 200 Connection established\r\n\r\nTLS")
                .await
                .unwrap();
            String::from_utf8(seen).unwrap()
        });
        tunnel(&mut client, "example.com:443", Some("Basic eDp5")).await.unwrap();
        let mut rest = [0u8; 3];
        client.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"TLS");
        let sent = proxy.await.unwrap();
        assert!(sent.starts_with("CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n"));
        assert!(sent.contains("Proxy-Authorization: Basic eDp5\r\n"));
    }

    #[tokio::test]
    async fn tunnel_refused() {
        let (mut client, mut server) = duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let _ = server.read(&mut buf).await;
            let _ = server
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\nContent-Length: 0\r\n\r\n")
                .await;
        });
        let err = tunnel(&mut client, "example.com:443", None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("407 Proxy Authentication Required"));
    }
}
