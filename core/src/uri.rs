/*
 * uri.rs
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

//! Form and query encoding (`application/x-www-form-urlencoded`). Pairs keep insertion order;
//! repeated keys produce repeated `key=value` pairs.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Form component set: everything except ALPHA / DIGIT / `*` `-` `.` `_` is percent-encoded.
const FORM_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// Encode one key or value; space becomes `+`.
pub fn encode_form_component(s: &str) -> String {
    utf8_percent_encode(s, FORM_COMPONENT)
        .to_string()
        .replace("%20", "+")
}

/// Serialize `(key, value)` pairs as `k1=v1&k2=v2`.
pub fn encode_form_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (k, v) in pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode_form_component(k));
        out.push('=');
        out.push_str(&encode_form_component(v));
    }
    out
}

/// Append an already-encoded query fragment to the URL, keeping any existing query.
pub fn append_query(url: &mut Url, encoded: &str) {
    if encoded.is_empty() {
        return;
    }
    let combined = match url.query() {
        Some(q) if !q.is_empty() => format!("{}&{}", q, encoded),
        _ => encoded.to_string(),
    };
    url.set_query(Some(&combined));
}

/// Request target for an origin-form request line: path plus query.
pub fn origin_form(url: &Url) -> String {
    let mut target = url.path().to_string();
    if target.is_empty() {
        target.push('/');
    }
    if let Some(q) = url.query() {
        target.push('?');
        target.push_str(q);
    }
    target
}

/// `host[:port]` for the Host header / `:authority`; the port is omitted when it is the scheme default.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(p) => format!("{}:{}", host, p),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters_are_encoded() {
        assert_eq!(encode_form_component("a b&c=d/é"), "a+b%26c%3Dd%2F%C3%A9");
        assert_eq!(encode_form_component("x-y_z.*"), "x-y_z.*");
        assert_eq!(encode_form_component("100%"), "100%25");
    }

    #[test]
    fn pairs_keep_order_and_repeats() {
        let s = encode_form_pairs([("b", "2"), ("a", "1"), ("b", "3")]);
        assert_eq!(s, "b=2&a=1&b=3");
    }

    #[test]
    fn append_query_keeps_existing() {
        let mut u = Url::parse("http://x/p?q=1").unwrap();
        append_query(&mut u, "a=2");
        assert_eq!(u.as_str(), "http://x/p?q=1&a=2");
        let mut bare = Url::parse("http://x/").unwrap();
        append_query(&mut bare, "a=1+2");
        assert_eq!(bare.query(), Some("a=1+2"));
    }

    #[test]
    fn origin_form_and_authority() {
        let u = Url::parse("https://example.com:8443/a/b?c=d#frag").unwrap();
        assert_eq!(origin_form(&u), "/a/b?c=d");
        assert_eq!(authority(&u), "example.com:8443");
        let d = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(authority(&d), "example.com");
    }
}
