//! Soil Data Access tabular queries.

use crate::http::HttpClient;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Public Soil Data Access tabular endpoint.
pub const SDA_TABULAR_URL: &str = "https://SDMDataAccess.sc.egov.usda.gov/Tabular/post.rest";

/// A service answering SQL-like queries with rows of JSON values.
pub trait TabularService {
    /// Run `query` and return its rows. A non-success status is an error.
    fn query(&self, query: &str) -> Result<Vec<Vec<Value>>>;
}

/// Endpoint settings for the tabular service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularEndpoint {
    /// POST endpoint.
    pub url: String,
}

impl Default for TabularEndpoint {
    fn default() -> Self {
        Self {
            url: SDA_TABULAR_URL.to_string(),
        }
    }
}

/// [`TabularService`] speaking the Soil Data Access JSON protocol.
#[derive(Debug)]
pub struct SdaTabularClient<C> {
    client: C,
    endpoint: TabularEndpoint,
}

impl<C: HttpClient> SdaTabularClient<C> {
    /// Use the public endpoint.
    pub fn new(client: C) -> Self {
        Self::with_endpoint(client, TabularEndpoint::default())
    }

    /// Use a custom endpoint.
    pub fn with_endpoint(client: C, endpoint: TabularEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl<C: HttpClient> TabularService for SdaTabularClient<C> {
    fn query(&self, query: &str) -> Result<Vec<Vec<Value>>> {
        debug!("Tabular query: {}", query);
        let body = json!({ "format": "json", "query": query });
        let response = self.client.post_json(&self.endpoint.url, &body)?;
        let rows = parse_table(&response)?;
        info!("Tabular query returned {} row(s)", rows.len());
        Ok(rows)
    }
}

/// Extract the `Table` rows of a response. A response without a table
/// (the service's answer to a query matching nothing) has no rows.
pub fn parse_table(body: &[u8]) -> Result<Vec<Vec<Value>>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_slice(body)?;
    let rows = match value.get("Table").and_then(Value::as_array) {
        Some(rows) => rows
            .iter()
            .map(|row| row.as_array().cloned().unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AcquireError;
    use std::sync::Mutex;

    struct Recorder {
        status: Option<u16>,
        response: &'static str,
        bodies: Mutex<Vec<Value>>,
    }

    impl HttpClient for Recorder {
        fn get(&self, _url: &str) -> Result<Vec<u8>> {
            unreachable!("tabular service only issues POST requests")
        }

        fn post_json(&self, url: &str, body: &Value) -> Result<Vec<u8>> {
            self.bodies.lock().unwrap().push(body.clone());
            if let Some(status) = self.status {
                return Err(AcquireError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Ok(self.response.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_query_posts_json_and_reads_table() {
        let client = SdaTabularClient::new(Recorder {
            status: None,
            response: r#"{"Table":[["545801","60","B"],["545801","40",null]]}"#,
            bodies: Mutex::new(Vec::new()),
        });
        let rows = client.query("SELECT 1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], Value::from("B"));
        assert!(rows[1][2].is_null());

        let sent = client.client.bodies.lock().unwrap();
        assert_eq!(sent[0], json!({"format": "json", "query": "SELECT 1"}));
    }

    #[test]
    fn test_missing_table_means_no_rows() {
        assert!(parse_table(b"{}").unwrap().is_empty());
        assert!(parse_table(b"").unwrap().is_empty());
    }

    #[test]
    fn test_status_error_propagates() {
        let client = SdaTabularClient::new(Recorder {
            status: Some(500),
            response: "",
            bodies: Mutex::new(Vec::new()),
        });
        assert!(matches!(
            client.query("SELECT 1"),
            Err(AcquireError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_table(b"not json"), Err(AcquireError::Json(_))));
    }
}
