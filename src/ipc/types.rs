use std::time::Duration;

use serde::Deserialize;

use crate::remote::RemoteStore;
use crate::store::Dataset;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub remote: Option<RemoteStore>,
    pub data: Option<Dataset>,
    pub store_timeout: Duration,
}
