/*
 * redirect.rs
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

//! Redirect decisions: which 3xx responses are followed and how the next hop's request is
//! derived from the current one.

use tracing::debug;
use url::Url;

use crate::config::EngineConfig;
use crate::engine::spec::{Entity, PreparedRequest};
use crate::error::{RequestError, Result};
use crate::protocol::http::Method;

/// Hop bound and 301/302 convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    pub max: u32,
    /// Rewrite non-GET/HEAD requests to a bodiless GET on 301/302.
    pub legacy_rewrite: bool,
}

impl From<&EngineConfig> for RedirectPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max: config.max_redirects,
            legacy_rewrite: config.legacy_redirect_rewrite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    Initial,
    Redirecting { hops: u32 },
    Terminal,
}

/// Outcome of inspecting one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The request has been rewritten for the next hop.
    Follow,
    /// The response just received is final.
    Stop,
}

pub fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Drives one call's redirect chain.
#[derive(Debug)]
pub struct RedirectHandler {
    policy: RedirectPolicy,
    state: RedirectState,
    origin: Origin,
    authorization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    host: Option<String>,
    port: Option<u16>,
}

impl Origin {
    fn of(url: &Url) -> Self {
        Self {
            host: url.host_str().map(str::to_ascii_lowercase),
            port: url.port_or_known_default(),
        }
    }
}

impl RedirectHandler {
    /// Captures the original host and `auth` credentials of `request`.
    pub fn new(policy: RedirectPolicy, request: &PreparedRequest) -> Self {
        Self {
            policy,
            state: RedirectState::Initial,
            origin: Origin::of(&request.url),
            authorization: request.authorization.clone(),
        }
    }

    pub fn state(&self) -> RedirectState {
        self.state
    }

    fn hops(&self) -> u32 {
        match self.state {
            RedirectState::Redirecting { hops } => hops,
            _ => 0,
        }
    }

    fn stop(&mut self, why: &str) -> Result<Action> {
        debug!(reason = why, "not following redirect");
        self.state = RedirectState::Terminal;
        Ok(Action::Stop)
    }

    /// Inspect a response to `request`. On [`Action::Follow`] the request has been updated in
    /// place for the next hop.
    pub fn next(&mut self, request: &mut PreparedRequest, status: u16, location: Option<&str>) -> Result<Action> {
        if self.state == RedirectState::Terminal {
            return Ok(Action::Stop);
        }
        if !is_redirect_status(status) || !request.follow_redirects {
            self.state = RedirectState::Terminal;
            return Ok(Action::Stop);
        }
        let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
            return self.stop("missing Location");
        };
        let mut target = match request.url.join(location) {
            Ok(url) => url,
            Err(_) => return self.stop("unparsable Location"),
        };
        if !matches!(target.scheme(), "http" | "https") {
            return self.stop("unsupported Location scheme");
        }
        if request.url.scheme() == "https" && target.scheme() == "http" {
            return self.stop("https to http downgrade");
        }
        target.set_fragment(None);

        let rewrite = match status {
            303 => true,
            301 | 302 => self.policy.legacy_rewrite && !request.method.is_get_or_head(),
            _ => false,
        };
        if !rewrite && matches!(request.entity, Entity::Consumed) {
            return self.stop("streamed body cannot be replayed");
        }

        let hops = self.hops() + 1;
        if hops > self.policy.max {
            self.state = RedirectState::Terminal;
            return Err(RequestError::TooManyRedirects { max: self.policy.max });
        }

        if rewrite {
            request.method = Method::Get;
            request.entity = Entity::None;
            for name in ["content-type", "content-length", "transfer-encoding"] {
                request.headers.remove(name);
            }
        }
        if Origin::of(&target) == self.origin {
            request.authorization = self.authorization.clone();
        } else {
            request.authorization = None;
            if Origin::of(&target) != Origin::of(&request.url) {
                request.headers.remove("authorization");
                request.headers.remove("cookie");
            }
        }
        debug!(status, from = %request.url, to = %target, method = %request.method, hops, "following redirect");
        request.url = target;
        self.state = RedirectState::Redirecting { hops };
        Ok(Action::Follow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spec::RequestSpec;
    use bytes::Bytes;

    fn prepared(url: &str, method: Method, body: &'static str) -> PreparedRequest {
        let mut b = RequestSpec::builder(url).method(method);
        if !body.is_empty() {
            b = b.body(body);
        }
        b.build().validate(&EngineConfig::default()).unwrap()
    }

    fn handler(req: &PreparedRequest) -> RedirectHandler {
        RedirectHandler::new(RedirectPolicy::from(&EngineConfig::default()), req)
    }

    fn body_of(req: &PreparedRequest) -> Option<Bytes> {
        match &req.entity {
            Entity::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }

    #[test]
    fn see_other_becomes_bodiless_get() {
        for method in [Method::Post, Method::Put, Method::Delete, Method::Other("PURGE".into())] {
            let mut req = prepared("http://a.test/form", method, "payload");
            let mut h = handler(&req);
            assert_eq!(h.next(&mut req, 303, Some("/done")).unwrap(), Action::Follow);
            assert_eq!(req.method, Method::Get);
            assert!(matches!(req.entity, Entity::None));
            assert!(!req.headers.contains("content-type"));
            assert_eq!(req.url.as_str(), "http://a.test/done");
            assert_eq!(h.state(), RedirectState::Redirecting { hops: 1 });
        }
    }

    #[test]
    fn permanent_redirect_preserves_method_and_body() {
        let mut req = prepared("http://a.test/upload", Method::Put, "payload");
        let mut h = handler(&req);
        assert_eq!(h.next(&mut req, 308, Some("http://b.test/v2/upload#frag")).unwrap(), Action::Follow);
        assert_eq!(req.method, Method::Put);
        assert_eq!(body_of(&req).as_deref(), Some(&b"payload"[..]));
        assert_eq!(req.headers.get("content-type"), Some("text/plain; charset=UTF-8"));
        assert_eq!(req.url.as_str(), "http://b.test/v2/upload");
    }

    #[test]
    fn legacy_rewrite_is_configurable() {
        let mut req = prepared("http://a.test/", Method::Post, "x");
        let mut h = handler(&req);
        h.next(&mut req, 302, Some("/next")).unwrap();
        assert_eq!(req.method, Method::Get);

        let mut req = prepared("http://a.test/", Method::Post, "x");
        let policy = RedirectPolicy { max: 5, legacy_rewrite: false };
        let mut h = RedirectHandler::new(policy, &req);
        h.next(&mut req, 301, Some("/next")).unwrap();
        assert_eq!(req.method, Method::Post);
        assert!(body_of(&req).is_some());
    }

    #[test]
    fn downgrade_is_not_followed() {
        let mut req = prepared("https://a.test/", Method::Get, "");
        let mut h = handler(&req);
        assert_eq!(h.next(&mut req, 301, Some("http://a.test/")).unwrap(), Action::Stop);
        assert_eq!(req.url.as_str(), "https://a.test/");
        assert_eq!(h.state(), RedirectState::Terminal);
    }

    #[test]
    fn non_redirect_or_disabled_or_missing_location_stops() {
        let mut req = prepared("http://a.test/", Method::Get, "");
        assert_eq!(handler(&req).next(&mut req, 200, None).unwrap(), Action::Stop);
        assert_eq!(handler(&req).next(&mut req, 302, None).unwrap(), Action::Stop);
        assert_eq!(handler(&req).next(&mut req, 304, Some("/x")).unwrap(), Action::Stop);
        assert_eq!(handler(&req).next(&mut req, 302, Some("mailto:x@y")).unwrap(), Action::Stop);
        req.follow_redirects = false;
        assert_eq!(handler(&req).next(&mut req, 302, Some("/x")).unwrap(), Action::Stop);
    }

    #[test]
    fn hop_bound_fails_with_too_many_redirects() {
        let mut req = prepared("http://a.test/0", Method::Get, "");
        let mut h = RedirectHandler::new(RedirectPolicy { max: 2, legacy_rewrite: true }, &req);
        assert_eq!(h.next(&mut req, 302, Some("/1")).unwrap(), Action::Follow);
        assert_eq!(h.next(&mut req, 302, Some("/2")).unwrap(), Action::Follow);
        let err = h.next(&mut req, 302, Some("/3")).unwrap_err();
        assert!(matches!(err, RequestError::TooManyRedirects { max: 2 }));
    }

    #[test]
    fn consumed_stream_blocks_preserving_redirect() {
        let mut req = prepared("http://a.test/", Method::Post, "");
        req.entity = Entity::Consumed;
        let mut h = handler(&req);
        assert_eq!(h.next(&mut req, 307, Some("/again")).unwrap(), Action::Stop);

        let mut h = handler(&req);
        assert_eq!(h.next(&mut req, 303, Some("/result")).unwrap(), Action::Follow);
        assert!(matches!(req.entity, Entity::None));
    }

    #[test]
    fn credentials_stay_on_original_host() {
        let mut req = RequestSpec::builder("http://a.test/")
            .auth("u", "p")
            .header("Cookie", "sid=1")
            .build()
            .validate(&EngineConfig::default())
            .unwrap();
        let mut h = handler(&req);
        assert!(req.authorization.is_some());

        h.next(&mut req, 302, Some("http://b.test/")).unwrap();
        assert!(req.authorization.is_none());
        assert!(!req.headers.contains("cookie"));

        h.next(&mut req, 302, Some("http://a.test/back")).unwrap();
        assert_eq!(req.authorization.as_deref(), Some("Basic dTpw"));
    }
}
