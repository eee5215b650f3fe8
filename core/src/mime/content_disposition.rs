/*
 * content_disposition.rs
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

//! Content-Disposition header (RFC 7578 form-data parts).

use super::content_type::parse_parameter_list;
use super::utils::{is_token, quote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    disposition_type: String,
    parameters: Vec<(String, String)>,
}

impl ContentDisposition {
    /// `form-data; name="..."[; filename="..."]`.
    pub fn form_data(name: &str, file_name: Option<&str>) -> Self {
        let mut parameters = vec![("name".to_string(), name.to_string())];
        if let Some(f) = file_name {
            parameters.push(("filename".to_string(), f.to_string()));
        }
        Self {
            disposition_type: "form-data".to_string(),
            parameters,
        }
    }

    pub fn disposition_type(&self) -> &str {
        &self.disposition_type
    }

    pub fn is_disposition_type(&self, t: &str) -> bool {
        self.disposition_type.eq_ignore_ascii_case(t)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Header value with every parameter quoted.
    pub fn to_header_value(&self) -> String {
        let mut out = self.disposition_type.clone();
        for (name, value) in &self.parameters {
            out.push_str("; ");
            out.push_str(name);
            out.push('=');
            out.push_str(&quote(value));
        }
        out
    }
}

pub fn parse_content_disposition(value: &str) -> Option<ContentDisposition> {
    let value = value.trim();
    let (disp_part, params_part) = match value.find(';') {
        Some(i) => (value[..i].trim(), &value[i + 1..]),
        None => (value, ""),
    };
    if !is_token(disp_part) {
        return None;
    }
    Some(ContentDisposition {
        disposition_type: disp_part.to_ascii_lowercase(),
        parameters: parse_parameter_list(params_part),
    })
}
