/*
 * error.rs
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

//! Request errors. One variant per failure kind a caller can act on; protocol code below the
//! engine works in `std::io::Error` and is mapped here at the boundary.

use std::fmt;
use std::io;

use thiserror::Error;

/// Phase in which a deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// DNS, TCP connect, proxy tunnel and TLS handshake.
    Connect,
    /// Waiting for (or writing) bytes of the exchange itself.
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connect"),
            TimeoutPhase::Read => f.write_str("read"),
        }
    }
}

/// Errors returned by [`crate::request`] and [`crate::Engine`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// A request parameter is missing or malformed. Nothing was sent.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// PEM trust anchors or client identity could not be used.
    #[error("certificate error: {0}")]
    CertificateParse(String),

    /// Connect-phase or read-phase deadline exceeded.
    #[error("{0} timed out")]
    Timeout(TimeoutPhase),

    /// The redirect chain was longer than the configured bound.
    #[error("too many redirects (max {max})")]
    TooManyRedirects { max: u32 },

    /// DNS, TLS handshake, reset, proxy rejection or protocol failure.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: io::Error,
    },

    /// The request entity could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, RequestError>;

impl RequestError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn certificate(msg: impl Into<String>) -> Self {
        Self::CertificateParse(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Wrap an I/O error from the transport. `TimedOut` errors raised by the deadline
    /// wrappers become [`RequestError::Timeout`] in the given phase.
    pub fn from_io(err: io::Error, phase: TimeoutPhase) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            return Self::Timeout(phase);
        }
        Self::Transport {
            message: err.to_string(),
            source: err,
        }
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    pub fn is_certificate(&self) -> bool {
        matches!(self, Self::CertificateParse(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Phase of a timeout error, `None` for every other kind.
    pub fn timeout_phase(&self) -> Option<TimeoutPhase> {
        match self {
            Self::Timeout(phase) => Some(*phase),
            _ => None,
        }
    }

    pub fn is_too_many_redirects(&self) -> bool {
        matches!(self, Self::TooManyRedirects { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn timed_out_io_maps_to_phase() {
        let err = RequestError::from_io(
            io::Error::new(io::ErrorKind::TimedOut, "read timed out"),
            TimeoutPhase::Read,
        );
        assert!(err.is_timeout());
        assert_eq!(err.timeout_phase(), Some(TimeoutPhase::Read));
        assert_eq!(err.to_string(), "read timed out");
    }

    #[test]
    fn other_io_maps_to_transport_with_source() {
        let err = RequestError::from_io(
            io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"),
            TimeoutPhase::Connect,
        );
        assert!(err.is_transport());
        assert!(err.timeout_phase().is_none());
        assert_eq!(err.source().map(|s| s.to_string()), Some("reset by peer".into()));
    }

    #[test]
    fn invalid_parameter_names_field() {
        let err = RequestError::invalid("url", "must not be empty");
        assert!(err.is_invalid_parameter());
        assert_eq!(err.to_string(), "invalid parameter `url`: must not be empty");
    }
}
