/*
 * config.rs
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

//! Engine configuration: redirect bound and policy, default timeouts, User-Agent.
//! Loaded from JSON (`~/.httpcall/config.json` by convention) with environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RequestError, Result};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Engine-wide settings. Every field has a default so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Hop bound for redirect chains; exceeding it fails with `TooManyRedirects`.
    pub max_redirects: u32,
    /// 301/302 rewrite non-GET/HEAD requests to a bodiless GET (browser convention).
    /// When false, 301/302 keep method and body like 307/308.
    pub legacy_redirect_rewrite: bool,
    /// Sent unless the request carries its own User-Agent. `None` uses `httpcall/<version>`.
    pub user_agent: Option<String>,
    pub default_connection_timeout_ms: u64,
    pub default_read_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            legacy_redirect_rewrite: true,
            user_agent: None,
            default_connection_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_read_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RequestError::invalid("config", e.to_string()))
    }

    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_json(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RequestError::invalid(
                "config",
                format!("{}: {}", path.display(), e),
            )),
        }
    }

    /// Load the per-user file (`~/.httpcall/config.json`, defaults when absent) and apply
    /// `HTTPCALL_*` environment overrides on top.
    pub fn load_user() -> Result<Self> {
        Self::load_layered(default_config_path().as_deref(), |key| std::env::var(key).ok())
    }

    fn load_layered(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(lookup))
    }

    /// Apply `HTTPCALL_*` environment variables on top of this config. Unparsable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("HTTPCALL_MAX_REDIRECTS").and_then(|v| v.trim().parse().ok()) {
            self.max_redirects = v;
        }
        if let Some(v) = lookup("HTTPCALL_USER_AGENT").filter(|v| !v.trim().is_empty()) {
            self.user_agent = Some(v);
        }
        if let Some(v) = lookup("HTTPCALL_CONNECT_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.default_connection_timeout_ms = v;
        }
        if let Some(v) = lookup("HTTPCALL_READ_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.default_read_timeout_ms = v;
        }
        self
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("httpcall/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Default config directory: ~/.httpcall.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".httpcall"))
}

/// Default config file: ~/.httpcall/config.json.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("config.json"))
}
