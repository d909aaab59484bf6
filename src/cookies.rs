//! Process-wide session cookie store.
//!
//! Cookies arrive once at startup as a base64-encoded JSON array of
//! `{name, value, domain, path}` objects. After [`init_from_env`] the store is
//! immutable for the life of the process.

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

static STORE: OnceCell<Arc<CookieJar>> = OnceCell::new();

/// A single session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Render as a `name=value; Domain=...; Path=...` line.
    pub fn to_line(&self) -> String {
        format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        )
    }
}

/// An ordered, read-only set of cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    /// Decode a base64 JSON payload.
    pub fn decode(encoded: &str) -> crate::error::Result<Self> {
        let raw = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| crate::error::SongdlError::InvalidInput(format!("cookie payload is not base64: {e}")))?;
        let cookies: Vec<Cookie> = serde_json::from_slice(&raw)?;
        Ok(Self { cookies })
    }

    /// Decode a payload, logging and falling back to an empty jar on failure.
    pub fn decode_or_empty(encoded: &str) -> Self {
        match Self::decode(encoded) {
            Ok(jar) => jar,
            Err(e) => {
                warn!("Ignoring cookie payload: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// `name=value` pairs joined for a `Cookie` request header.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Render the jar in the line-oriented staging format, one cookie per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for cookie in &self.cookies {
            out.push_str(&cookie.to_line());
            out.push('\n');
        }
        out
    }
}

/// Load the global store from `var`. Only the first call has any effect.
pub fn init_from_env(var: &str) -> Arc<CookieJar> {
    STORE
        .get_or_init(|| {
            let jar = match std::env::var(var) {
                Ok(encoded) if !encoded.trim().is_empty() => CookieJar::decode_or_empty(&encoded),
                _ => CookieJar::default(),
            };
            debug!("Loaded {} cookies from {}", jar.len(), var);
            Arc::new(jar)
        })
        .clone()
}
