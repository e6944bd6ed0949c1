//! SAP Transport Management Service client.
//!
//! `client` holds the OAuth token manager and the typed resource calls;
//! `mapping` cross-validates node-name→descriptor mappings before upload.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod client;
pub mod mapping;

/// Default description for transport requests created by an upload.
pub const DEFAULT_TRANSPORT_DESCRIPTION: &str = "Created by the stagehand pipeline";

/// Token response from the UAA endpoint.
///
/// `expires_in` is carried but unused: the token is fetched once at client
/// construction and kept for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthToken {
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl AuthToken {
    /// Authorization header value, e.g. `"Bearer xyz"`.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Named remote deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodesResponse {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MtaExtDescriptor {
    pub id: i64,
    pub description: String,
    pub mta_id: String,
    pub mta_ext_id: String,
    pub mta_version: String,
    pub last_changed_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MtaExtDescriptorsResponse {
    #[serde(rename = "mtaExtDescriptors")]
    pub mta_ext_descriptors: Vec<MtaExtDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "fileId")]
    pub id: i64,
    #[serde(rename = "fileName")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUploadResponse {
    pub transport_request_id: i64,
    pub transport_request_description: String,
    pub queue_entries: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueEntry {
    #[serde(rename = "queueId")]
    pub id: i64,
    #[serde(rename = "nodeId")]
    pub node_id: i64,
    #[serde(rename = "nodeName")]
    pub node_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeUploadRequest {
    pub content_type: String,
    pub storage_type: String,
    pub node_name: String,
    pub description: String,
    pub named_user: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Entry {
    pub uri: String,
}

/// TMS service key as provisioned by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceKey {
    pub uaa: Uaa,
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uaa {
    pub url: String,
    #[serde(rename = "clientid")]
    pub client_id: String,
    #[serde(rename = "clientsecret")]
    pub client_secret: String,
}

pub fn parse_service_key(service_key_json: &str) -> Result<ServiceKey> {
    Ok(serde_json::from_str(service_key_json)?)
}
