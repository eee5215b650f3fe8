/*
 * mod.rs
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

//! Header-level MIME parsing: media types and form-data dispositions.

mod content_disposition;
mod content_type;
mod utils;

pub use content_disposition::{parse_content_disposition, ContentDisposition};
pub use content_type::{parse_content_type, parse_parameter_list, ContentType};
pub use utils::{is_boundary_char, is_token, is_token_char, is_valid_boundary, quote};
