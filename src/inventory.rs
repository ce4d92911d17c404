//! Inventory service wire model.
//!
//! The inventory service stores servers with any number of namespaced
//! attribute blobs. Lookups go through its list endpoint, which accepts
//! attribute filters encoded as query parameters:
//!
//! ```text
//! GET /api/v1/servers?attr=<namespace>~<key.path>~<operator>~<value>
//! ```
//!
//! Attribute payloads stay opaque ([`RawValue`]) until a consumer picks the
//! namespace it understands and decodes that one blob.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::error::Result;

/// Comparison operator of an attribute filter. Lease lookups only need the
/// SQL-style substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
        }
    }
}

/// One attribute filter on a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeListParams {
    pub namespace: String,
    pub keys: Vec<String>,
    pub operator: Option<Operator>,
    pub value: String,
}

impl AttributeListParams {
    /// Encodes the filter as the value of an `attr` query parameter.
    ///
    /// Keys are joined with `.`; the operator and value are only emitted
    /// when keys are present.
    pub fn encode(&self) -> String {
        let mut encoded = self.namespace.clone();
        if !self.keys.is_empty() {
            encoded.push('~');
            encoded.push_str(&self.keys.join("."));
            if let Some(operator) = self.operator {
                encoded.push('~');
                encoded.push_str(operator.as_str());
                encoded.push('~');
                encoded.push_str(&self.value);
            }
        }
        encoded
    }
}

/// Parameters for the server list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerListParams {
    pub attributes: Vec<AttributeListParams>,
}

impl ServerListParams {
    /// Returns the query pairs for this request.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.attributes
            .iter()
            .map(|attribute| ("attr", attribute.encode()))
            .collect()
    }
}

/// A server record as returned by the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: Vec<Attributes>,
}

impl Server {
    /// Returns the payload of the first attribute in `namespace`, if any.
    pub fn attribute(&self, namespace: &str) -> Option<&RawValue> {
        self.attributes
            .iter()
            .find(|attribute| attribute.namespace == namespace)
            .map(|attribute| attribute.data.as_ref())
    }
}

/// A namespaced, opaque attribute blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attributes {
    pub namespace: String,
    pub data: Box<RawValue>,
}

/// Success envelope of the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServerListResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub records: Vec<Server>,
}

/// The service encodes empty lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Error body of the inventory service.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServerErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: String,
}

/// Read access to the inventory service.
///
/// Implemented over HTTP by [`InventoryClient`](crate::client::InventoryClient);
/// tests substitute in-memory implementations.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Lists servers matching `params`.
    async fn list_servers(&self, params: &ServerListParams) -> Result<Vec<Server>>;
}
