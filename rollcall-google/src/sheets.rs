//! Sheets v4 spreadsheet handle.
//!
//! | step       | endpoint                                             |
//! |------------|------------------------------------------------------|
//! | clear      | `POST spreadsheets/{id}:batchUpdate` (deleteDimension)|
//! | append     | `POST spreadsheets/{id}/values/{range}:append`       |
//! | update     | `PUT  spreadsheets/{id}/values/{range}`              |

use rollcall_core::Cell;
use rollcall_sync::{SpreadsheetHandle, StructuralEdit, ValueInput};
use serde_json::{json, Value};

use crate::error::{http_err, GoogleError};
use crate::oauth::Credentials;

pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct SheetsClient {
    base_url: String,
    spreadsheet_id: String,
    credentials: Credentials,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: SHEETS_API.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
        }
    }

    /// Point the handle at another API root, e.g. a local stand-in server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn bearer(&mut self) -> Result<String, GoogleError> {
        Ok(format!("Bearer {}", self.credentials.access_token()?))
    }

    fn send(
        &mut self,
        method: &str,
        url: String,
        query: &[(&str, &str)],
        body: Value,
    ) -> Result<(), GoogleError> {
        let bearer = self.bearer()?;
        let mut request = self
            .credentials
            .agent()
            .request(method, &url)
            .set("Authorization", &bearer);
        for (key, value) in query {
            request = request.query(key, value);
        }
        request.send_json(body).map_err(|e| http_err(&url, e))?;
        tracing::debug!(%method, %url, "sheets request ok");
        Ok(())
    }
}

impl SpreadsheetHandle for SheetsClient {
    type Error = GoogleError;

    fn batch_structural_edit(&mut self, edit: &StructuralEdit) -> Result<(), GoogleError> {
        let url = batch_update_url(&self.base_url, &self.spreadsheet_id);
        self.send("POST", url, &[], batch_update_body(edit))
    }

    fn append_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), GoogleError> {
        let url = values_url(&self.base_url, &self.spreadsheet_id, range, ":append");
        self.send(
            "POST",
            url,
            &[
                ("valueInputOption", input.as_str()),
                ("insertDataOption", "OVERWRITE"),
            ],
            values_body(range, rows),
        )
    }

    fn update_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), GoogleError> {
        let url = values_url(&self.base_url, &self.spreadsheet_id, range, "");
        self.send(
            "PUT",
            url,
            &[("valueInputOption", input.as_str())],
            values_body(range, rows),
        )
    }
}

pub(crate) fn batch_update_url(base: &str, spreadsheet_id: &str) -> String {
    format!("{base}/{}:batchUpdate", urlencoding::encode(spreadsheet_id))
}

pub(crate) fn values_url(base: &str, spreadsheet_id: &str, range: &str, suffix: &str) -> String {
    format!(
        "{base}/{}/values/{}{suffix}",
        urlencoding::encode(spreadsheet_id),
        urlencoding::encode(range),
    )
}

/// Unbounded `deleteDimension` requests for rows, then columns.
pub(crate) fn batch_update_body(edit: &StructuralEdit) -> Value {
    json!({
        "requests": [
            {
                "deleteDimension": {
                    "range": {
                        "sheetId": edit.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": edit.delete_rows_from,
                    }
                }
            },
            {
                "deleteDimension": {
                    "range": {
                        "sheetId": edit.sheet_id,
                        "dimension": "COLUMNS",
                        "startIndex": edit.delete_columns_from,
                    }
                }
            }
        ]
    })
}

pub(crate) fn values_body(range: &str, rows: &[Vec<Cell>]) -> Value {
    json!({
        "majorDimension": "ROWS",
        "range": range,
        "values": rows,
    })
}
