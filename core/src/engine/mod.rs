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

//! The request engine: validate a [`RequestSpec`], load TLS material once, run hops through
//! the transport until the redirect handler settles on a final response, and map it.

pub mod body;
pub mod multipart;
pub mod record;
pub mod redirect;
pub mod spec;
mod transport;

use std::sync::Arc;

use tracing::Instrument;

use crate::config::EngineConfig;
use crate::error::{RequestError, Result};
use crate::net::{SystemTrust, TransportContext, TrustDefaults};
use crate::tls::TlsMaterial;

pub use record::{BodyStream, ResponseRecord};
pub use redirect::{RedirectPolicy, RedirectState};
pub use spec::{Auth, Body, ParamValue, PartSpec, ProxySpec, RequestSpec, RequestSpecBuilder};

use redirect::{Action, RedirectHandler};

/// Executes requests with one configuration and one source of default trust anchors.
/// Calls are independent; an `Engine` can be shared between threads.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    trust: Arc<dyn TrustDefaults>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            trust: Arc::new(SystemTrust),
        }
    }

    /// Engine configured from `~/.httpcall/config.json` and `HTTPCALL_*` environment
    /// variables. See [`EngineConfig::load_user`].
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EngineConfig::load_user()?))
    }

    /// Replace the trust anchors used when a request carries no `certificates`.
    pub fn with_trust_defaults(mut self, trust: Arc<dyn TrustDefaults>) -> Self {
        self.trust = trust;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the request to completion, following redirects. For callers already inside a
    /// tokio runtime.
    pub async fn execute(&self, spec: RequestSpec) -> Result<ResponseRecord> {
        let span = tracing::debug_span!("request", method = %spec.method, url = %spec.url);
        self.run(spec).instrument(span).await
    }

    /// Blocking form of [`Engine::execute`] on a current-thread runtime created for the call.
    /// Must not be called from within an async context.
    pub fn request(&self, spec: RequestSpec) -> Result<ResponseRecord> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RequestError::Transport {
                message: format!("cannot start runtime: {}", e),
                source: e,
            })?;
        runtime.block_on(self.execute(spec))
    }

    async fn run(&self, spec: RequestSpec) -> Result<ResponseRecord> {
        let mut request = spec.validate(&self.config)?;
        let material = TlsMaterial::load(
            request.certificates.as_deref(),
            request.client_certificate.as_deref(),
        )?;
        let mut context = TransportContext::new(material, self.trust.clone(), request.disable_http2);
        let mut redirects = RedirectHandler::new(RedirectPolicy::from(&self.config), &request);

        loop {
            let raw = transport::exchange(&mut context, &mut request).await?;
            match redirects.next(&mut request, raw.status, raw.header("location"))? {
                Action::Follow => continue,
                Action::Stop => return Ok(ResponseRecord::from_raw(raw, request.url)),
            }
        }
    }
}

/// Perform `spec` with the built-in defaults, blocking until the exchange (including any
/// redirects) completes, fails or times out. The per-user config file and environment are
/// not consulted; use [`Engine::from_env`] for that.
pub fn request(spec: RequestSpec) -> Result<ResponseRecord> {
    Engine::default().request(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::Method;

    #[test]
    fn invalid_spec_fails_without_network() {
        let err = request(RequestSpec::builder("").build()).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn bad_pem_fails_before_connecting() {
        // TEST-NET-1 address: a connection attempt would end in a transport error.
        let spec = RequestSpec::builder("https://192.0.2.1:9/")
            .method(Method::Get)
            .certificates(&b"-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n"[..])
            .connection_timeout_ms(50)
            .build();
        let err = request(spec).unwrap_err();
        assert!(err.is_certificate(), "{:?}", err);
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
