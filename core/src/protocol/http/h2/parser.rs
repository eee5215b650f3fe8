/*
 * parser.rs
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

//! HTTP/2 frame push parser: consumes complete frames from a buffer, dispatches to H2FrameHandler.

use bytes::{Buf, Bytes, BytesMut};

use super::frame::*;
use super::handler::H2FrameHandler;

/// Push parser for HTTP/2 frames. Feed bytes via `receive`; the handler is invoked for each
/// complete frame. After a connection error the parser refuses further input.
pub struct H2Parser {
    max_frame_size: usize,
    failed: bool,
}

impl H2Parser {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            failed: false,
        }
    }

    /// Largest frame payload we accept (our advertised SETTINGS_MAX_FRAME_SIZE).
    pub fn set_max_frame_size(&mut self, size: usize) -> bool {
        if (MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&size) {
            self.max_frame_size = size;
            true
        } else {
            false
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Consume as many complete frames as possible from buf. Partial frame data is left in buf.
    pub fn receive<H: H2FrameHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) {
        while !self.failed && buf.len() >= FRAME_HEADER_LENGTH {
            let length = (buf[0] as usize) << 16 | (buf[1] as usize) << 8 | (buf[2] as usize);
            if length > self.max_frame_size {
                self.fail(
                    handler,
                    ERROR_FRAME_SIZE_ERROR,
                    0,
                    format!("frame size {} exceeds max {}", length, self.max_frame_size),
                );
                return;
            }
            if buf.len() < FRAME_HEADER_LENGTH + length {
                return;
            }
            let frame_type = buf[3];
            let flags = buf[4];
            let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7fff_ffff;
            buf.advance(FRAME_HEADER_LENGTH);
            let payload = buf.split_to(length).freeze();
            if let Err((code, message)) = dispatch_frame(frame_type, flags, stream_id, payload, handler)
            {
                self.fail(handler, code, stream_id, message);
            }
        }
    }

    fn fail<H: H2FrameHandler>(&mut self, handler: &mut H, code: u32, stream_id: u32, message: String) {
        self.failed = true;
        handler.frame_error(code, stream_id, message);
    }
}

impl Default for H2Parser {
    fn default() -> Self {
        Self::new()
    }
}

type FrameResult = Result<(), (u32, String)>;

fn protocol_error(message: &str) -> FrameResult {
    Err((ERROR_PROTOCOL_ERROR, message.to_string()))
}

fn size_error(message: &str) -> FrameResult {
    Err((ERROR_FRAME_SIZE_ERROR, message.to_string()))
}

fn dispatch_frame<H: H2FrameHandler>(
    frame_type: u8,
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    match frame_type {
        TYPE_DATA => parse_data_frame(flags, stream_id, payload, handler),
        TYPE_HEADERS => parse_headers_frame(flags, stream_id, payload, handler),
        TYPE_PRIORITY => parse_priority_frame(stream_id, payload),
        TYPE_RST_STREAM => parse_rst_stream_frame(stream_id, payload, handler),
        TYPE_SETTINGS => parse_settings_frame(flags, stream_id, payload, handler),
        TYPE_PUSH_PROMISE => parse_push_promise_frame(flags, stream_id, payload, handler),
        TYPE_PING => parse_ping_frame(flags, stream_id, payload, handler),
        TYPE_GOAWAY => parse_goaway_frame(stream_id, payload, handler),
        TYPE_WINDOW_UPDATE => parse_window_update_frame(stream_id, payload, handler),
        TYPE_CONTINUATION => parse_continuation_frame(flags, stream_id, payload, handler),
        _ => Ok(()), // unknown frame types are ignored
    }
}

/// Strip padding from a PADDED frame payload.
fn unpad(flags: u8, mut payload: Bytes, frame: &str) -> Result<Bytes, (u32, String)> {
    if flags & FLAG_PADDED == 0 {
        return Ok(payload);
    }
    if payload.is_empty() {
        return Err((ERROR_PROTOCOL_ERROR, format!("{} frame PADDED but no pad length", frame)));
    }
    let pad_len = payload.get_u8() as usize;
    if payload.len() < pad_len {
        return Err((ERROR_PROTOCOL_ERROR, format!("{} frame padding exceeds payload", frame)));
    }
    payload.truncate(payload.len() - pad_len);
    Ok(payload)
}

fn parse_data_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("DATA frame with stream ID 0");
    }
    let flow_len = payload.len() as u32;
    let data = unpad(flags, payload, "DATA")?;
    handler.data_frame_received(stream_id, flags & FLAG_END_STREAM != 0, data, flow_len);
    Ok(())
}

fn parse_headers_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("HEADERS frame with stream ID 0");
    }
    let mut block = unpad(flags, payload, "HEADERS")?;
    if flags & FLAG_PRIORITY != 0 {
        if block.len() < 5 {
            return size_error("HEADERS frame with PRIORITY too short");
        }
        block.advance(5); // stream dependency + weight
    }
    handler.headers_frame_received(
        stream_id,
        flags & FLAG_END_STREAM != 0,
        flags & FLAG_END_HEADERS != 0,
        block,
    );
    Ok(())
}

fn parse_priority_frame(stream_id: u32, payload: Bytes) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("PRIORITY frame with stream ID 0");
    }
    if payload.len() != 5 {
        return size_error("PRIORITY frame must be 5 bytes");
    }
    Ok(())
}

fn parse_rst_stream_frame<H: H2FrameHandler>(
    stream_id: u32,
    mut payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("RST_STREAM frame with stream ID 0");
    }
    if payload.len() != 4 {
        return size_error("RST_STREAM frame must be 4 bytes");
    }
    handler.rst_stream_frame_received(stream_id, payload.get_u32());
    Ok(())
}

fn parse_settings_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    mut payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id != 0 {
        return protocol_error("SETTINGS frame with non-zero stream ID");
    }
    let ack = flags & FLAG_ACK != 0;
    if ack && !payload.is_empty() {
        return size_error("SETTINGS ACK frame must be empty");
    }
    if payload.len() % 6 != 0 {
        return size_error("SETTINGS frame size must be multiple of 6");
    }
    let mut settings = Vec::with_capacity(payload.len() / 6);
    while payload.has_remaining() {
        let id = payload.get_u16();
        let value = payload.get_u32();
        settings.push((id, value));
    }
    handler.settings_frame_received(ack, settings);
    Ok(())
}

fn parse_push_promise_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("PUSH_PROMISE frame with stream ID 0");
    }
    let mut block = unpad(flags, payload, "PUSH_PROMISE")?;
    if block.len() < 4 {
        return size_error("PUSH_PROMISE frame too short");
    }
    let promised = block.get_u32() & 0x7fff_ffff;
    handler.push_promise_frame_received(stream_id, promised);
    Ok(())
}

fn parse_ping_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    mut payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id != 0 {
        return protocol_error("PING frame with non-zero stream ID");
    }
    if payload.len() != 8 {
        return size_error("PING frame must be 8 bytes");
    }
    handler.ping_frame_received(flags & FLAG_ACK != 0, payload.get_u64());
    Ok(())
}

fn parse_goaway_frame<H: H2FrameHandler>(
    stream_id: u32,
    mut payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id != 0 {
        return protocol_error("GOAWAY frame with non-zero stream ID");
    }
    if payload.len() < 8 {
        return size_error("GOAWAY frame must be at least 8 bytes");
    }
    let last_stream_id = payload.get_u32() & 0x7fff_ffff;
    let error_code = payload.get_u32();
    handler.goaway_frame_received(last_stream_id, error_code, payload);
    Ok(())
}

fn parse_window_update_frame<H: H2FrameHandler>(
    stream_id: u32,
    mut payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if payload.len() != 4 {
        return size_error("WINDOW_UPDATE frame must be 4 bytes");
    }
    let increment = payload.get_u32() & 0x7fff_ffff;
    if increment == 0 {
        return protocol_error("WINDOW_UPDATE increment must be non-zero");
    }
    handler.window_update_frame_received(stream_id, increment);
    Ok(())
}

fn parse_continuation_frame<H: H2FrameHandler>(
    flags: u8,
    stream_id: u32,
    payload: Bytes,
    handler: &mut H,
) -> FrameResult {
    if stream_id == 0 {
        return protocol_error("CONTINUATION frame with stream ID 0");
    }
    handler.continuation_frame_received(stream_id, flags & FLAG_END_HEADERS != 0, payload);
    Ok(())
}
