/*
 * body.rs
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

//! Body encoder: form serialization, explicit bodies, content-type inference.

use bytes::Bytes;

use crate::engine::spec::{flatten, Body, Entity, ParamValue};
use crate::uri;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// `application/x-www-form-urlencoded` serialization; repeated keys stay in insertion order.
pub fn encode_form(params: &[(String, ParamValue)]) -> String {
    uri::encode_form_pairs(flatten(params))
}

/// Content type for an explicit body when the caller named none.
pub fn infer_content_type(body: &Body) -> &'static str {
    match body {
        Body::Text(_) => TEXT_CONTENT_TYPE,
        Body::Bytes(_) | Body::Reader(_) => BINARY_CONTENT_TYPE,
    }
}

/// An explicit body is sent verbatim: text as UTF-8, bytes as-is, readers streamed.
pub fn explicit(body: Body) -> Entity {
    match body {
        Body::Text(s) => Entity::Bytes(Bytes::from(s.into_bytes())),
        Body::Bytes(b) => Entity::Bytes(b),
        Body::Reader(r) => Entity::Stream(r),
    }
}
