/*
 * mod.rs
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

//! HTTP client: HTTP/1.1 and HTTP/2 with push-parsed responses.
//!
//! - Callback-based response API: `ResponseHandler` with `ok`/`error`, `header`, `start_body`,
//!   `body_chunk`, `end_body`, `complete`.
//! - Buffers: `bytes` crate (BytesMut for parse buffers, Bytes for payload slices).
//! - HTTP/1.1: state-machine response parser. HTTP/2: our own frame parser + HPACK (no
//!   external h2 crate).
//! - TLS with ALPN `h2`, `http/1.1`; plaintext is always HTTP/1.1.
//! - Proxies: CONNECT tunnels for TLS, absolute-form forwarding for plaintext.

mod handler;
mod request;
mod response;

pub mod h1;
pub mod h2;
pub mod hpack;

pub use h1::H1ResponseHandler;
pub use handler::ResponseHandler;
pub use request::{Method, RequestBody, RequestBuilder};
pub use response::Response;

pub mod client;
pub mod connection;
pub mod proxy;

pub use client::{Endpoint, HttpClient, Timeouts, TlsSetup};
pub use connection::{HttpConnection, HttpStream, HttpVersion};
pub use proxy::{basic_credentials, ProxyEndpoint};
