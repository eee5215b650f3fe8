/*
 * encoder.rs
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

//! HPACK encoder (RFC 7541) for request header blocks. Never touches the dynamic table, so
//! every block is independent of the peer's table size.

use bytes::BufMut;

use super::huffman;
use super::static_table;

/// Headers whose values must not be indexed by intermediaries.
const SENSITIVE: &[&str] = &["authorization", "proxy-authorization", "cookie"];

/// Encode request headers (pseudo-headers first, then regular) into out. Names are
/// lowercased; static-table entries are referenced by index when they match.
pub fn encode_request_headers(headers: &[(&str, &str)], out: &mut impl BufMut) {
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        encode_field(&name, value, out);
    }
}

fn encode_field(name: &str, value: &str, out: &mut impl BufMut) {
    let never_indexed = SENSITIVE.contains(&name);
    let prefix = if never_indexed { 0x10 } else { 0x00 };
    match static_table::find(name, value) {
        Some((index, true)) if !never_indexed => encode_integer(index as u64, 7, 0x80, out),
        Some((index, _)) => {
            encode_integer(index as u64, 4, prefix, out);
            encode_string(value.as_bytes(), out);
        }
        None => {
            out.put_u8(prefix);
            encode_string(name.as_bytes(), out);
            encode_string(value.as_bytes(), out);
        }
    }
}

/// String literal, Huffman-coded when that is shorter.
fn encode_string(s: &[u8], out: &mut impl BufMut) {
    let huffman_len = huffman::encoded_length(s);
    if huffman_len < s.len() {
        encode_integer(huffman_len as u64, 7, 0x80, out);
        out.put_slice(&huffman::encode(s));
    } else {
        encode_integer(s.len() as u64, 7, 0x00, out);
        out.put_slice(s);
    }
}

fn encode_integer(mut value: u64, nbits: u8, prefix: u8, out: &mut impl BufMut) {
    let max_prefix = (1u64 << nbits) - 1;
    if value < max_prefix {
        out.put_u8(prefix | value as u8);
        return;
    }
    out.put_u8(prefix | max_prefix as u8);
    value -= max_prefix;
    while value >= 128 {
        out.put_u8(0x80 | (value % 128) as u8);
        value /= 128;
    }
    out.put_u8(value as u8);
}

#[cfg(test)]
mod tests {
    use super::super::Decoder;
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn uses_static_indices() {
        let mut buf = BytesMut::new();
        encode_request_headers(&[(":method", "GET"), (":scheme", "https"), (":path", "/")], &mut buf);
        assert_eq!(&buf[..], &[0x82, 0x87, 0x84]);
    }

    #[test]
    fn lowercases_names_and_decodes_back() {
        let input = [
            (":method", "PATCH"),
            (":scheme", "https"),
            (":authority", "www.example.com"),
            (":path", "/resource?q=1"),
            ("Content-Type", "application/x-www-form-urlencoded"),
            ("X-Request-Id", "42"),
            ("Authorization", "Basic dXNlcjpwYXNz"),
        ];
        let mut buf = BytesMut::new();
        encode_request_headers(&input, &mut buf);
        let mut out: Vec<(String, String)> = Vec::new();
        Decoder::new(4096).decode(&mut &buf[..], &mut out).unwrap();
        let expected: Vec<(String, String)> = input
            .iter()
            .map(|(n, v)| (n.to_ascii_lowercase(), v.to_string()))
            .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn authorization_is_never_indexed() {
        let mut buf = BytesMut::new();
        encode_request_headers(&[("authorization", "x")], &mut buf);
        // 0x1f 0x08: never-indexed, name index 23 (15 + 8)
        assert_eq!(&buf[..2], &[0x1f, 0x08]);
    }

    #[test]
    fn long_integer_encoding() {
        let mut buf = BytesMut::new();
        encode_integer(1337, 5, 0, &mut buf);
        assert_eq!(&buf[..], &[31, 154, 10]);
    }
}
