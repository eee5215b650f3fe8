/*
 * writer.rs
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

//! HTTP/2 frame writer: serializes frames into a buffer.

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::*;

/// Writes HTTP/2 frames into a BytesMut. Caller is responsible for sending the buffer to the stream.
pub struct H2Writer {
    buf: BytesMut,
}

impl H2Writer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_MAX_FRAME_SIZE + FRAME_HEADER_LENGTH),
        }
    }

    fn write_frame_header(&mut self, length: usize, frame_type: u8, flags: u8, stream_id: u32) {
        self.buf.put_u8((length >> 16) as u8);
        self.buf.put_u8((length >> 8) as u8);
        self.buf.put_u8(length as u8);
        self.buf.put_u8(frame_type);
        self.buf.put_u8(flags);
        self.buf.put_u32(stream_id & 0x7fff_ffff);
    }

    pub fn write_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) {
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        self.write_frame_header(data.len(), TYPE_DATA, flags, stream_id);
        self.buf.extend_from_slice(data);
    }

    /// Append a header block as one HEADERS frame followed by as many CONTINUATION frames as
    /// `max_frame_size` requires.
    pub fn write_header_block(
        &mut self,
        stream_id: u32,
        header_block: &[u8],
        end_stream: bool,
        max_frame_size: usize,
    ) {
        let mut chunks = header_block.chunks(max_frame_size.max(1)).peekable();
        let first = chunks.next().unwrap_or(&[]);
        let mut flags = if end_stream { FLAG_END_STREAM } else { 0 };
        if chunks.peek().is_none() {
            flags |= FLAG_END_HEADERS;
        }
        self.write_frame_header(first.len(), TYPE_HEADERS, flags, stream_id);
        self.buf.extend_from_slice(first);
        while let Some(chunk) = chunks.next() {
            let flags = if chunks.peek().is_none() { FLAG_END_HEADERS } else { 0 };
            self.write_frame_header(chunk.len(), TYPE_CONTINUATION, flags, stream_id);
            self.buf.extend_from_slice(chunk);
        }
    }

    pub fn write_rst_stream(&mut self, stream_id: u32, error_code: u32) {
        self.write_frame_header(4, TYPE_RST_STREAM, 0, stream_id);
        self.buf.put_u32(error_code);
    }

    pub fn write_settings(&mut self, settings: &[(u16, u32)]) {
        self.write_frame_header(settings.len() * 6, TYPE_SETTINGS, 0, 0);
        for (id, value) in settings {
            self.buf.put_u16(*id);
            self.buf.put_u32(*value);
        }
    }

    pub fn write_settings_ack(&mut self) {
        self.write_frame_header(0, TYPE_SETTINGS, FLAG_ACK, 0);
    }

    pub fn write_ping(&mut self, opaque_data: u64, ack: bool) {
        let flags = if ack { FLAG_ACK } else { 0 };
        self.write_frame_header(8, TYPE_PING, flags, 0);
        self.buf.put_u64(opaque_data);
    }

    pub fn write_window_update(&mut self, stream_id: u32, increment: u32) {
        self.write_frame_header(4, TYPE_WINDOW_UPDATE, 0, stream_id);
        self.buf.put_u32(increment & 0x7fff_ffff);
    }

    pub fn write_goaway(&mut self, last_stream_id: u32, error_code: u32, debug_data: &[u8]) {
        self.write_frame_header(8 + debug_data.len(), TYPE_GOAWAY, 0, 0);
        self.buf.put_u32(last_stream_id & 0x7fff_ffff);
        self.buf.put_u32(error_code);
        self.buf.extend_from_slice(debug_data);
    }

    /// Take the accumulated buffer. Writer remains usable (buffer is replaced with new empty).
    pub fn take_buffer(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for H2Writer {
    fn default() -> Self {
        Self::new()
    }
}
