//! Google Sheets adapter
//!
//! Implements [`Spreadsheet`] over the Sheets API v4 `values` endpoints.
//! The API has no conditional write, so `compare_existing` is a read
//! followed by a write; two writers can still interleave between the two.
//! Callers that need stronger guarantees serialize per cell themselves.

use async_trait::async_trait;
use labgrader_state::{A1Range, GatewayError, GatewayResult, Spreadsheet};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::http::{build_client, check_status, read_json, send_error};

const SERVICE: &str = "sheets";

/// Public Sheets API endpoint.
pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com";

/// Sheets configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// OAuth2 access token with the spreadsheets scope
    pub access_token: Option<String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        SheetsConfig {
            api_url: std::env::var("SHEETS_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }
}

impl SheetsConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(api_url: &str) -> Self {
        SheetsConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }
}

/// Google Sheets client
pub struct SheetsClient {
    config: SheetsConfig,
    http_client: reqwest::Client,
}

impl SheetsClient {
    pub fn new(config: SheetsConfig) -> GatewayResult<Self> {
        Ok(SheetsClient {
            config,
            http_client: build_client(SERVICE)?,
        })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(SheetsConfig::from_env())
    }

    /// `{api}/v4/spreadsheets/{id}[/values/{range}]` with every segment
    /// percent-encoded.
    fn url(&self, spreadsheet_id: &str, range: Option<&A1Range>) -> GatewayResult<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| GatewayError::protocol(SERVICE, format!("bad api url: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::protocol(SERVICE, "api url cannot be a base"))?;
            segments.pop_if_empty().extend(["v4", "spreadsheets", spreadsheet_id]);
            if let Some(range) = range {
                segments.extend(["values", &range.to_string()]);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_cell(&self, spreadsheet_id: &str, sheet: &str, col: u32, row: u32) -> GatewayResult<String> {
        let rows = self
            .get_range(spreadsheet_id, &A1Range::cell(sheet, col, row))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetDto {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetDto {
    #[serde(default)]
    sheets: Vec<SheetDto>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sheets reports a range on a missing tab as a 400 parse failure.
fn is_missing_sheet(err: &GatewayError) -> bool {
    matches!(err, GatewayError::Protocol { message, .. }
        if message.starts_with("400") && message.contains("Unable to parse range"))
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

#[async_trait]
impl Spreadsheet for SheetsClient {
    async fn list_groups(&self, spreadsheet_id: &str) -> GatewayResult<Vec<String>> {
        let mut url = self.url(spreadsheet_id, None)?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");
        let resp = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| send_error(SERVICE, e))?;
        let doc: SpreadsheetDto = read_json(SERVICE, resp).await?;
        Ok(doc.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Range,
    ) -> GatewayResult<Vec<Vec<String>>> {
        let url = self.url(spreadsheet_id, Some(range))?;
        let resp = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| send_error(SERVICE, e))?;
        let body: ValueRange = read_json(SERVICE, resp).await.map_err(|e| {
            if is_missing_sheet(&e) {
                GatewayError::SheetNotFound {
                    sheet: range.sheet.clone(),
                }
            } else {
                e
            }
        })?;
        debug!(range = %range, rows = body.values.len(), "read range");
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn set_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        col: u32,
        row: u32,
        value: &str,
        compare_existing: Option<&str>,
    ) -> GatewayResult<()> {
        let range = A1Range::cell(sheet, col, row);
        if let Some(expected) = compare_existing {
            let current = self.read_cell(spreadsheet_id, sheet, col, row).await?;
            if current != expected {
                return Err(GatewayError::CompareFailed {
                    cell: range.to_string(),
                    expected: expected.to_string(),
                    found: current,
                });
            }
        }

        let mut url = self.url(spreadsheet_id, Some(&range))?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range.to_string(),
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        let resp = self
            .authorize(self.http_client.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(SERVICE, e))?;
        match check_status(SERVICE, resp).await {
            Ok(_) => {
                info!(cell = %range, "cell written");
                Ok(())
            }
            Err(e) if is_missing_sheet(&e) => Err(GatewayError::SheetNotFound {
                sheet: sheet.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("api_url", &self.config.api_url)
            .field("authorized", &self.config.access_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_encodes_range() {
        let client = SheetsClient::new(SheetsConfig::new("https://sheets.example.com")).unwrap();
        let url = client
            .url("abc123", Some(&A1Range::row_span("4232", 2, 4, 28)))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc123/values/'4232'!D2:AB2"
        );

        let url = client
            .url("abc123", Some(&A1Range::cell("гр 4232", 3, 5)))
            .unwrap();
        assert!(url.path().ends_with("/values/'%D0%B3%D1%80%204232'!C5"));
    }

    #[test]
    fn test_value_range_decoding() {
        let body: ValueRange = serde_json::from_value(json!({
            "range": "'4232'!A1:C2",
            "values": [["2", "Ivanov Ivan", "octocat"], [3]]
        }))
        .unwrap();
        let rows: Vec<Vec<String>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        assert_eq!(rows[0][2], "octocat");
        assert_eq!(rows[1], vec!["3".to_string()]);

        let empty: ValueRange = serde_json::from_value(json!({"range": "'4232'!A1"})).unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn test_missing_sheet_detection() {
        let err = GatewayError::protocol(SERVICE, "400 Bad Request: Unable to parse range: '9999'!A1");
        assert!(is_missing_sheet(&err));
        assert!(!is_missing_sheet(&GatewayError::protocol(SERVICE, "403 Forbidden")));
    }

    #[test]
    fn test_debug_hides_token() {
        let client =
            SheetsClient::new(SheetsConfig::new("https://x").with_access_token("secret")).unwrap();
        assert!(!format!("{client:?}").contains("secret"));
    }
}
