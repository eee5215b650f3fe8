/*
 * tls.rs
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

//! TLS material: PEM trust anchors and client identity (private key + certificate chain).
//!
//! Parsed once per request call and reused for every redirect hop. Keys may be PKCS#8,
//! PKCS#1 (RSA) or SEC1 (EC); the key is checked against the leaf certificate's public key.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls::{Error as TlsError, InconsistentKeys, RootCertStore};
use rustls_pemfile::Item;

use crate::error::{RequestError, Result};
use crate::net::crypto_provider;

/// Client certificate chain and matching private key.
pub struct ClientIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientIdentity {
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub(crate) fn key(&self) -> PrivateKeyDer<'static> {
        self.key.clone_key()
    }
}

impl Clone for ClientIdentity {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Trust and identity material for one request call. `None` fields fall back to the
/// engine's [`crate::net::TrustDefaults`] and to no client authentication.
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    pub roots: Option<Arc<RootCertStore>>,
    pub identity: Option<ClientIdentity>,
}

impl TlsMaterial {
    pub fn load(certificates: Option<&[u8]>, client_certificate: Option<&[u8]>) -> Result<Self> {
        let roots = certificates
            .map(parse_trust_anchors)
            .transpose()?
            .map(Arc::new);
        let identity = client_certificate.map(parse_client_identity).transpose()?;
        Ok(Self { roots, identity })
    }
}

fn read_pem(pem: &[u8], what: &str) -> Result<Vec<Item>> {
    let mut reader = pem;
    rustls_pemfile::read_all(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RequestError::certificate(format!("malformed PEM in {}: {}", what, e)))
}

/// Parse one or more PEM `CERTIFICATE` blocks into a root store.
pub fn parse_trust_anchors(pem: &[u8]) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    for (i, item) in read_pem(pem, "certificates")?.into_iter().enumerate() {
        if let Item::X509Certificate(cert) = item {
            store.add(cert).map_err(|e| {
                RequestError::certificate(format!("invalid CA certificate #{}: {}", i + 1, e))
            })?;
        }
    }
    if store.is_empty() {
        return Err(RequestError::certificate(
            "no CERTIFICATE block found in certificates",
        ));
    }
    Ok(store)
}

/// Parse a private key block and a certificate chain, in either order.
pub fn parse_client_identity(pem: &[u8]) -> Result<ClientIdentity> {
    let mut chain = Vec::new();
    let mut keys: Vec<PrivateKeyDer<'static>> = Vec::new();
    for item in read_pem(pem, "client certificate")? {
        match item {
            Item::X509Certificate(cert) => chain.push(cert),
            Item::Pkcs8Key(k) => keys.push(k.into()),
            Item::Pkcs1Key(k) => keys.push(k.into()),
            Item::Sec1Key(k) => keys.push(k.into()),
            _ => {}
        }
    }
    if chain.is_empty() {
        return Err(RequestError::certificate(
            "client certificate: no CERTIFICATE block found",
        ));
    }
    let key = match keys.len() {
        0 => {
            return Err(RequestError::certificate(
                "client certificate: no private key block found",
            ))
        }
        1 => keys.remove(0),
        n => {
            return Err(RequestError::certificate(format!(
                "client certificate: expected one private key, found {}",
                n
            )))
        }
    };
    check_key_matches(&chain, &key)?;
    Ok(ClientIdentity { chain, key })
}

fn check_key_matches(chain: &[CertificateDer<'static>], key: &PrivateKeyDer<'static>) -> Result<()> {
    let signing_key = crypto_provider()
        .key_provider
        .load_private_key(key.clone_key())
        .map_err(|e| RequestError::certificate(format!("unsupported private key: {}", e)))?;
    match CertifiedKey::new(chain.to_vec(), signing_key).keys_match() {
        Ok(()) | Err(TlsError::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(TlsError::InconsistentKeys(InconsistentKeys::KeyMismatch)) => Err(
            RequestError::certificate("private key does not match the certificate's public key"),
        ),
        Err(e) => Err(RequestError::certificate(format!(
            "invalid client certificate: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA: &[u8] = include_bytes!("../tests/fixtures/ca.pem");
    const IDENTITY: &[u8] = include_bytes!("../tests/fixtures/client-identity.pem");
    const MISMATCHED: &[u8] = include_bytes!("../tests/fixtures/mismatched-identity.pem");
    const CLIENT_CERT: &[u8] = include_bytes!("../tests/fixtures/client.pem");

    #[test]
    fn loads_ca_bundle() {
        let store = parse_trust_anchors(CA).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse_trust_anchors(b"not a certificate").unwrap_err();
        assert!(err.is_certificate());
        let bad = b"-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert!(parse_trust_anchors(bad).unwrap_err().is_certificate());
    }

    #[test]
    fn der_that_is_not_a_certificate_is_rejected() {
        let bogus = b"-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        assert!(parse_trust_anchors(bogus).unwrap_err().is_certificate());
    }

    #[test]
    fn identity_key_then_cert() {
        let id = parse_client_identity(IDENTITY).unwrap();
        assert_eq!(id.chain().len(), 1);
    }

    #[test]
    fn identity_cert_then_key() {
        let text = std::str::from_utf8(IDENTITY).unwrap();
        let split = text.find("-----BEGIN CERTIFICATE-----").unwrap();
        let swapped = format!("{}{}", &text[split..], &text[..split]);
        assert!(parse_client_identity(swapped.as_bytes()).is_ok());
    }

    #[test]
    fn identity_without_key_fails() {
        let err = parse_client_identity(CLIENT_CERT).unwrap_err();
        assert!(err.to_string().contains("no private key"));
    }

    #[test]
    fn mismatched_key_fails() {
        let err = parse_client_identity(MISMATCHED).unwrap_err();
        assert!(err.is_certificate());
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn material_defaults_when_absent() {
        let m = TlsMaterial::load(None, None).unwrap();
        assert!(m.roots.is_none());
        assert!(m.identity.is_none());
    }
}
