/*
 * content_type.rs
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

//! Content-Type header (RFC 9110 media type): type/subtype plus ordered parameters.

use super::utils::{is_token, unquote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    primary_type: String,
    sub_type: String,
    parameters: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(primary_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            primary_type: primary_type.into().to_ascii_lowercase(),
            sub_type: sub_type.into().to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary_type, self.sub_type)
    }

    pub fn is_mime_type(&self, primary: &str, sub: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(primary) && self.sub_type.eq_ignore_ascii_case(sub)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// True for media types whose entity is text in some charset: `text/*`, JSON, XML
    /// (including `+json` / `+xml` suffixes), JavaScript and form-encoded bodies.
    pub fn is_text_like(&self) -> bool {
        if self.primary_type == "text" {
            return true;
        }
        if self.primary_type != "application" {
            return false;
        }
        matches!(
            self.sub_type.as_str(),
            "json" | "xml" | "javascript" | "ecmascript" | "x-www-form-urlencoded" | "xhtml+xml"
        ) || self.sub_type.ends_with("+json")
            || self.sub_type.ends_with("+xml")
    }
}

/// Parse a Content-Type value. Returns None when the type/subtype is not two tokens.
pub fn parse_content_type(value: &str) -> Option<ContentType> {
    let value = value.trim();
    let (type_part, params_part) = match value.find(';') {
        Some(i) => (value[..i].trim(), &value[i + 1..]),
        None => (value, ""),
    };
    let slash = type_part.find('/')?;
    let primary = type_part[..slash].trim();
    let sub = type_part[slash + 1..].trim();
    if !is_token(primary) || !is_token(sub) {
        return None;
    }
    let mut ct = ContentType::new(primary, sub);
    ct.parameters = parse_parameter_list(params_part);
    Some(ct)
}

/// Parse a `;`-separated list of `name=value` / `name="quoted value"` parameters.
/// Malformed entries are skipped. Names are lower-cased; order is preserved.
pub fn parse_parameter_list(params: &str) -> Vec<(String, String)> {
    let bytes = params.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let next_semi = bytes[pos..].iter().position(|&b| b == b';').map(|i| pos + i);
        let eq = match bytes[pos..].iter().position(|&b| b == b'=') {
            Some(i) if next_semi.map_or(true, |s| pos + i < s) => pos + i,
            _ => {
                pos = next_semi.unwrap_or(len);
                continue;
            }
        };
        let name = params[pos..eq].trim();
        pos = eq + 1;
        while pos < len && bytes[pos] == b' ' {
            pos += 1;
        }
        let value = if pos < len && bytes[pos] == b'"' {
            let (v, consumed) = unquote(&params[pos..]);
            pos += consumed;
            v
        } else {
            let end = bytes[pos..].iter().position(|&b| b == b';').map_or(len, |i| pos + i);
            let v = params[pos..end].trim().to_string();
            pos = end;
            v
        };
        if is_token(name) {
            out.push((name.to_ascii_lowercase(), value));
        }
    }
    out
}
