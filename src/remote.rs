use std::time::Duration;

use sha2::{Digest, Sha256};
use ureq::Agent;

use crate::store::Dataset;

/// Whole-document version token: SHA-256 over the canonical JSON form of
/// the dataset. Carried as `baseVersion` on every push so a store that
/// understands it can refuse stale writes; a store that ignores it keeps
/// the plain last-writer-wins contract.
pub fn document_version(data: &Dataset) -> String {
    let bytes = serde_json::to_vec(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RemoteError {
    pub code: &'static str,
    pub message: String,
}

impl RemoteError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Blocking client for the external whole-document store. One GET returns
/// the entire dataset; one POST (`action: setAllData`) overwrites it. No
/// partial fetch, no partial write.
pub struct RemoteStore {
    agent: Agent,
    url: String,
    last_version: Option<String>,
}

impl RemoteStore {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: Agent::new_with_config(config),
            url: url.to_string(),
            last_version: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Version of the document last fetched from or pushed to the store.
    pub fn version(&self) -> Option<&str> {
        self.last_version.as_deref()
    }

    pub fn fetch(&mut self) -> Result<Dataset, RemoteError> {
        tracing::debug!("fetching store document from {}", self.url);
        let mut res = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| RemoteError::new("store_unreachable", e.to_string()))?;
        if !res.status().is_success() {
            let body = res.body_mut().read_to_string().unwrap_or_default();
            return Err(RemoteError::new(
                "store_rejected",
                if body.trim().is_empty() {
                    format!("store answered {}", res.status())
                } else {
                    body
                },
            ));
        }
        let data: Dataset = res
            .body_mut()
            .read_json()
            .map_err(|e| RemoteError::new("bad_document", e.to_string()))?;
        let version = document_version(&data);
        tracing::debug!(
            "store document loaded: {} students, {} grade entries, version {}",
            data.students.len(),
            data.grade_entries.len(),
            version
        );
        self.last_version = Some(version);
        Ok(data)
    }

    /// Pushes the whole document. On success the returned version becomes
    /// the new base; on any failure the base stays put and the caller's
    /// local state is expected to stay put too.
    pub fn push(&mut self, data: &Dataset) -> Result<String, RemoteError> {
        let mut body = serde_json::json!({ "action": "setAllData", "payload": data });
        if let Some(v) = &self.last_version {
            body["baseVersion"] = serde_json::Value::String(v.clone());
        }
        let mut res = self
            .agent
            .post(&self.url)
            .send_json(&body)
            .map_err(|e| RemoteError::new("store_unreachable", e.to_string()))?;
        let status = res.status();
        if status.as_u16() == 409 {
            tracing::warn!("store refused push: document changed under us");
            return Err(RemoteError::new(
                "store_conflict",
                "store document changed since last fetch; reload before saving",
            ));
        }
        if !status.is_success() {
            let text = res.body_mut().read_to_string().unwrap_or_default();
            tracing::warn!("store rejected push with {}: {}", status, text);
            return Err(RemoteError::new(
                "store_rejected",
                if text.trim().is_empty() {
                    format!("store answered {}", status)
                } else {
                    text
                },
            ));
        }
        let version = document_version(data);
        tracing::debug!("store push acknowledged, version {}", version);
        self.last_version = Some(version.clone());
        Ok(version)
    }
}
