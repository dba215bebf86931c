//! HTTP discovery sidecar: browser version and debuggable target metadata.
//!
//! The debugger exposes two read-only endpoints next to the websocket:
//! `/json/version` describes the browser build and `/json/list` enumerates
//! the debuggable targets, each with the websocket address to connect to.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;

/// Browser build information from `/json/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct Version {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    #[serde(rename = "V8-Version", default)]
    pub v8_version: String,
    #[serde(rename = "Webkit-Version", default)]
    pub webkit_version: String,
}

/// One debuggable target from `/json/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "devtoolsFrontendUrl", default)]
    pub devtools_frontend_url: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    /// The per-target websocket address. Chrome spells the key
    /// `webSocketDebuggerUrl`; the alias accepts both spellings.
    #[serde(
        rename = "websocketDebuggerURL",
        alias = "webSocketDebuggerUrl",
        default
    )]
    pub websocket_debugger_url: String,
}

/// Fetches `/json/version` from the discovery sidecar.
pub fn version(host: &str, timeout: Duration) -> Result<Version, ClientError> {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    Ok(client
        .get(format!("{}/json/version", host))
        .send()?
        .error_for_status()?
        .json()?)
}

/// Fetches `/json/list` from the discovery sidecar.
pub fn targets(host: &str, timeout: Duration) -> Result<Vec<TargetInfo>, ClientError> {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    Ok(client
        .get(format!("{}/json/list", host))
        .send()?
        .error_for_status()?
        .json()?)
}

/// Returns the single listed target, or `DiscoveryMismatch` when the sidecar
/// lists zero or several.
pub(crate) fn single_target(host: &str, timeout: Duration) -> Result<TargetInfo, ClientError> {
    let mut found = targets(host, timeout)?;
    if found.len() != 1 {
        return Err(ClientError::DiscoveryMismatch {
            expected: 1,
            found: found.len(),
        });
    }
    Ok(found.remove(0))
}
