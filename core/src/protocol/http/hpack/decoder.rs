/*
 * decoder.rs
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

//! HPACK decoder (RFC 7541). Decodes header blocks into (name, value) pairs.
//! Supports indexed fields (static and dynamic table), all literal forms, Huffman-encoded
//! strings and dynamic table size updates.

use bytes::Buf;
use std::collections::VecDeque;
use std::io;

use super::huffman;
use super::static_table::{STATIC_TABLE, STATIC_TABLE_SIZE};

/// Per-entry overhead counted against the dynamic table size (RFC 7541 §4.1).
const ENTRY_OVERHEAD: usize = 32;

/// Callback for each decoded header.
pub trait HeaderHandler {
    fn header(&mut self, name: &str, value: &str);
}

impl HeaderHandler for Vec<(String, String)> {
    fn header(&mut self, name: &str, value: &str) {
        self.push((name.to_string(), value.to_string()));
    }
}

/// HPACK decoder state for one connection.
pub struct Decoder {
    /// Limit we advertised in SETTINGS_HEADER_TABLE_SIZE.
    settings_limit: usize,
    /// Current limit set by the encoder (<= settings_limit).
    max_size: usize,
    size: usize,
    dynamic_table: VecDeque<(String, String)>,
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("HPACK: {}", message))
}

impl Decoder {
    pub fn new(header_table_size: usize) -> Self {
        Self {
            settings_limit: header_table_size,
            max_size: header_table_size,
            size: 0,
            dynamic_table: VecDeque::new(),
        }
    }

    /// Decode a complete header block, calling handler for each field in order.
    pub fn decode<B: Buf, H: HeaderHandler>(&mut self, buf: &mut B, handler: &mut H) -> io::Result<()> {
        while buf.has_remaining() {
            let b = buf.get_u8();
            if b & 0x80 != 0 {
                let index = decode_integer(buf, b, 7)?;
                if index == 0 {
                    return Err(invalid("indexed header index 0"));
                }
                let (name, value) = self.lookup(index)?;
                handler.header(name, value);
            } else if b & 0x40 != 0 {
                let (name, value) = self.read_literal(buf, b, 6)?;
                handler.header(&name, &value);
                self.insert(name, value);
            } else if b & 0x20 != 0 {
                let new_size = decode_integer(buf, b, 5)? as usize;
                if new_size > self.settings_limit {
                    return Err(invalid("dynamic table size exceeds SETTINGS"));
                }
                self.max_size = new_size;
                self.evict_to(new_size);
            } else {
                // without indexing (0000) or never indexed (0001)
                let (name, value) = self.read_literal(buf, b, 4)?;
                handler.header(&name, &value);
            }
        }
        Ok(())
    }

    fn lookup(&self, index: u64) -> io::Result<(&str, &str)> {
        let index = index as usize;
        if index < STATIC_TABLE_SIZE {
            let (name, value) = STATIC_TABLE[index];
            return Ok((name, value.unwrap_or("")));
        }
        self.dynamic_table
            .get(index - STATIC_TABLE_SIZE)
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .ok_or_else(|| invalid("index out of range"))
    }

    fn read_literal<B: Buf>(&self, buf: &mut B, opcode: u8, nbits: u8) -> io::Result<(String, String)> {
        let index = decode_integer(buf, opcode, nbits)?;
        let name = if index == 0 {
            decode_string(buf)?
        } else {
            self.lookup(index)?.0.to_string()
        };
        let value = decode_string(buf)?;
        Ok((name, value))
    }

    fn insert(&mut self, name: String, value: String) {
        let entry_size = name.len() + value.len() + ENTRY_OVERHEAD;
        if entry_size > self.max_size {
            // An oversized entry empties the table and is not stored.
            self.dynamic_table.clear();
            self.size = 0;
            return;
        }
        self.evict_to(self.max_size - entry_size);
        self.size += entry_size;
        self.dynamic_table.push_front((name, value));
    }

    fn evict_to(&mut self, target: usize) {
        while self.size > target {
            match self.dynamic_table.pop_back() {
                Some((n, v)) => self.size -= n.len() + v.len() + ENTRY_OVERHEAD,
                None => {
                    self.size = 0;
                    break;
                }
            }
        }
    }
}

fn decode_integer<B: Buf>(buf: &mut B, opcode: u8, nbits: u8) -> io::Result<u64> {
    let mask = (1u64 << nbits) - 1;
    let mut value = opcode as u64 & mask;
    if value < mask {
        return Ok(value);
    }
    let mut shift = 0u32;
    loop {
        if !buf.has_remaining() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK integer truncated"));
        }
        let b = buf.get_u8();
        value += ((b & 0x7f) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 56 {
            return Err(invalid("integer too large"));
        }
    }
}

fn decode_string<B: Buf>(buf: &mut B) -> io::Result<String> {
    if !buf.has_remaining() {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK string length"));
    }
    let b = buf.get_u8();
    let len = decode_integer(buf, b, 7)? as usize;
    if buf.remaining() < len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "HPACK string truncated"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    if b & 0x80 != 0 {
        bytes = huffman::decode(&bytes)?;
    }
    // Field values are octets; non-UTF-8 bytes are replaced rather than failing the response.
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
