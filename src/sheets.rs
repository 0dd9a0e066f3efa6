use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

use crate::auth::TokenSource;
use crate::utils::error::{AppError, Result};

/// One worksheet as rows of string cells. The first sheet row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self { header, rows };
        table.pad_rows();
        table
    }

    /// Builds a table from raw sheet values, header first. Short rows are
    /// padded so every row has a cell per column.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let header = values.remove(0);
        Self::new(header, values)
    }

    /// Header followed by the data rows, as written back to the sheet.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    /// Index of `name`, appending an empty column when it does not exist yet.
    /// The API drops trailing blank header cells, so a new column goes after
    /// the widest row rather than after the last header cell.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.header.len());
        self.header.resize(width, String::new());
        self.header.push(name.to_string());
        self.pad_rows();
        width
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cells) = self.rows.get_mut(row) {
            if cells.len() <= column {
                cells.resize(column + 1, String::new());
            }
            cells[column] = value.into();
        }
    }

    fn pad_rows(&mut self) {
        let width = self.header.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }
}

/// Where the product rows live. Writes always replace the whole sheet.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_table(&self) -> Result<SheetTable>;

    /// Clears the worksheet, then writes header and rows from the top-left cell.
    async fn overwrite(&self, table: &SheetTable) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: Vec<Vec<String>>,
}

/// Google Sheets v4 `values` endpoints.
pub struct GoogleSheetsStore {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    range: String,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleSheetsStore {
    pub fn new(
        client: Client,
        api_base: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            return Err(AppError::Validation("sheet.spreadsheet_id is required".into()));
        }
        let api_base = Url::parse(api_base)
            .map_err(|e| AppError::Validation(format!("invalid sheet.api_base: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            range: a1_sheet_range(worksheet),
            tokens,
        })
    }

    fn values_url(&self, suffix: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Validation("sheet.api_base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{}{}", self.range, suffix));
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(AppError::SheetApi {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn read_table(&self) -> Result<SheetTable> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.values_url("")?)
            .bearer_auth(token)
            .send()
            .await?;

        let range: ValueRange = Self::check(response).await?.json().await?;
        tracing::debug!("Read {} rows from {}", range.values.len(), self.range);
        Ok(SheetTable::from_values(range.values))
    }

    async fn overwrite(&self, table: &SheetTable) -> Result<()> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(self.values_url(":clear")?)
            .bearer_auth(&token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(response).await?;

        let body = ValueRangeBody {
            range: &self.range,
            major_dimension: "ROWS",
            values: table.to_values(),
        };
        let mut url = self.values_url("")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let response = self
            .client
            .put(url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        tracing::debug!("Wrote {} rows to {}", table.rows.len() + 1, self.range);
        Ok(())
    }
}

/// Whole-sheet A1 range, quoted so names with spaces or dashes parse.
fn a1_sheet_range(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

/// Sheet held in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySheet {
    table: Mutex<SheetTable>,
    writes: Mutex<usize>,
}

impl MemorySheet {
    pub fn new(table: SheetTable) -> Self {
        Self {
            table: Mutex::new(table),
            writes: Mutex::new(0),
        }
    }

    pub async fn snapshot(&self) -> SheetTable {
        self.table.lock().await.clone()
    }

    pub async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn read_table(&self) -> Result<SheetTable> {
        Ok(self.table.lock().await.clone())
    }

    async fn overwrite(&self, table: &SheetTable) -> Result<()> {
        *self.table.lock().await = table.clone();
        *self.writes.lock().await += 1;
        Ok(())
    }
}
