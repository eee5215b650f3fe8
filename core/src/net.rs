/*
 * net.rs
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

//! TLS client configuration and default trust material.
//!
//! Default roots are injectable: production uses [`SystemTrust`] (platform native certs first,
//! then webpki-roots as fallback); tests supply a [`StaticTrust`] with their own CA.

use std::sync::{Arc, OnceLock};

use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};

use crate::error::{RequestError, Result};
use crate::tls::{ClientIdentity, TlsMaterial};

pub const ALPN_H2: &[u8] = b"h2";
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Source of the trust anchors used when a request supplies no `certificates`.
pub trait TrustDefaults: Send + Sync {
    fn default_roots(&self) -> Arc<RootCertStore>;
}

/// Platform trust store, loaded once per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrust;

static SYSTEM_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

impl TrustDefaults for SystemTrust {
    fn default_roots(&self) -> Arc<RootCertStore> {
        SYSTEM_ROOTS
            .get_or_init(|| Arc::new(build_root_store()))
            .clone()
    }
}

/// Fixed trust anchors.
#[derive(Debug, Clone)]
pub struct StaticTrust(pub Arc<RootCertStore>);

impl TrustDefaults for StaticTrust {
    fn default_roots(&self) -> Arc<RootCertStore> {
        self.0.clone()
    }
}

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            tracing::debug!(added, ignored, "loaded native root certificates");
        }
        Err(e) => tracing::warn!(error = %e, "could not load native root certificates"),
    }
    if root_store.is_empty() {
        tracing::warn!("no native roots available, using bundled Mozilla roots");
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.to_vec();
    }
    root_store
}

static PROVIDER: OnceLock<Arc<CryptoProvider>> = OnceLock::new();

/// Process-wide ring crypto provider (not installed as the global default).
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    PROVIDER
        .get_or_init(|| Arc::new(rustls::crypto::ring::default_provider()))
        .clone()
}

/// TLS client config with the given roots, optional client identity and ALPN list.
pub fn client_config(
    roots: Arc<RootCertStore>,
    identity: Option<&ClientIdentity>,
    alpn: &[&[u8]],
) -> Result<Arc<ClientConfig>> {
    let builder = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| RequestError::certificate(e.to_string()))?
        .with_root_certificates(roots);
    let mut config = match identity {
        Some(id) => builder
            .with_client_auth_cert(id.chain().to_vec(), id.key())
            .map_err(|e| RequestError::certificate(format!("client identity rejected: {}", e)))?,
        None => builder.with_no_client_auth(),
    };
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}

/// ALPN offer: `h2` then `http/1.1`, or only `http/1.1` when HTTP/2 is disabled.
pub fn alpn_protocols(disable_http2: bool) -> Vec<&'static [u8]> {
    if disable_http2 {
        vec![ALPN_HTTP11]
    } else {
        vec![ALPN_H2, ALPN_HTTP11]
    }
}

/// Per-call transport state shared by every hop: resolved trust anchors, client identity
/// and the TLS configs built from them (lazily, on the first secure hop).
pub struct TransportContext {
    material: TlsMaterial,
    defaults: Arc<dyn TrustDefaults>,
    disable_http2: bool,
    preferred: Option<Arc<ClientConfig>>,
    http1_only: Option<Arc<ClientConfig>>,
}

impl TransportContext {
    pub fn new(material: TlsMaterial, defaults: Arc<dyn TrustDefaults>, disable_http2: bool) -> Self {
        Self {
            material,
            defaults,
            disable_http2,
            preferred: None,
            http1_only: None,
        }
    }

    pub fn disable_http2(&self) -> bool {
        self.disable_http2
    }

    fn build(&self, alpn: &[&[u8]]) -> Result<Arc<ClientConfig>> {
        let roots = match &self.material.roots {
            Some(r) => r.clone(),
            None => self.defaults.default_roots(),
        };
        client_config(roots, self.material.identity.as_ref(), alpn)
    }

    /// Config offering `h2` (unless disabled) and `http/1.1`.
    pub fn tls_config(&mut self) -> Result<Arc<ClientConfig>> {
        if let Some(config) = &self.preferred {
            return Ok(config.clone());
        }
        let config = self.build(&alpn_protocols(self.disable_http2))?;
        self.preferred = Some(config.clone());
        Ok(config)
    }

    /// Config offering only `http/1.1`, for retrying after the server refused the ALPN offer.
    pub fn http1_tls_config(&mut self) -> Result<Arc<ClientConfig>> {
        if self.disable_http2 {
            return self.tls_config();
        }
        if let Some(config) = &self.http1_only {
            return Ok(config.clone());
        }
        let config = self.build(&alpn_protocols(true))?;
        self.http1_only = Some(config.clone());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::parse_trust_anchors;

    fn test_roots() -> Arc<RootCertStore> {
        Arc::new(parse_trust_anchors(include_bytes!("../tests/fixtures/ca.pem")).unwrap())
    }

    #[test]
    fn alpn_respects_disable_http2() {
        assert_eq!(alpn_protocols(false), vec![ALPN_H2, ALPN_HTTP11]);
        assert_eq!(alpn_protocols(true), vec![ALPN_HTTP11]);
    }

    #[test]
    fn context_builds_config_once() {
        let mut ctx = TransportContext::new(
            TlsMaterial::default(),
            Arc::new(StaticTrust(test_roots())),
            true,
        );
        let a = ctx.tls_config().unwrap();
        let b = ctx.tls_config().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.alpn_protocols, vec![b"http/1.1".to_vec()]);
        let c = ctx.http1_tls_config().unwrap();
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn http1_fallback_config_drops_h2() {
        let mut ctx = TransportContext::new(
            TlsMaterial::default(),
            Arc::new(StaticTrust(test_roots())),
            false,
        );
        assert_eq!(ctx.tls_config().unwrap().alpn_protocols.len(), 2);
        assert_eq!(ctx.http1_tls_config().unwrap().alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn client_identity_is_accepted() {
        let material = TlsMaterial::load(
            None,
            Some(include_bytes!("../tests/fixtures/client-identity.pem")),
        )
        .unwrap();
        let config = client_config(test_roots(), material.identity.as_ref(), &[ALPN_H2]);
        assert!(config.is_ok());
    }
}
