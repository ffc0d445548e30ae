//! Response envelope for the grid protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The final response, serialized in the wire casing the grid widget
/// expects: `{draw, recordsTotal, recordsFiltered, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Echo token from the request, uninterpreted
    pub draw: u64,
    /// Count with no filter predicate applied, pagination ignored
    #[serde(rename = "recordsTotal")]
    pub records_total: u64,
    /// Count with the filter predicate applied, pagination ignored
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: u64,
    /// The page of rows actually returned
    pub data: Vec<Value>,
}
