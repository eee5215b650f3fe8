/*
 * lib.rs
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

//! Httpcall core: a synchronous HTTP request engine.
//!
//! A [`RequestSpec`] describes one call (URL, method, parameters, body or multipart parts,
//! credentials, proxy, timeouts, TLS material). [`request`] validates it, sends it over
//! HTTP/2 or HTTP/1.1, follows redirects and returns a [`ResponseRecord`].
//!
//! ```no_run
//! use httpcall_core::{request, Method, RequestSpec};
//!
//! let spec = RequestSpec::builder("http://example.com/login")
//!     .method(Method::Post)
//!     .form("user", "alice")
//!     .form("lang", ["en", "fr"])
//!     .build();
//! let response = request(spec)?;
//! println!("{} {}", response.status, response.message);
//! # Ok::<(), httpcall_core::RequestError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod mime;
pub mod net;
pub mod protocol;
pub mod tls;
pub mod uri;

pub use config::EngineConfig;
pub use engine::{
    request, Auth, Body, BodyStream, Engine, ParamValue, PartSpec, ProxySpec, RequestSpec,
    RequestSpecBuilder, ResponseRecord,
};
pub use error::{RequestError, Result, TimeoutPhase};
pub use net::{StaticTrust, SystemTrust, TrustDefaults};
pub use protocol::http::{HttpVersion, Method};
