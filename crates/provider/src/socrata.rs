use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use shared::domain::RawCountRow;
use tracing::debug;
use url::Url;

use crate::{CountFilter, DataProvider, Dimension, ProviderError};

pub const DEFAULT_DATASET_URL: &str = "https://data.cityofnewyork.us/resource/nwxe-4ae8.json";

const COUNT_EXPR: &str = "count(tree_id)";
const COUNT_COLUMN: &str = "count_tree_id";
const APP_TOKEN_HEADER: &str = "X-App-Token";
const MAX_ERROR_BODY_BYTES: usize = 512;

#[derive(Debug, Clone)]
pub struct SocrataConfig {
    pub dataset_url: String,
    pub app_token: Option<String>,
    pub timeout: Duration,
    pub row_limit: u32,
}

impl Default for SocrataConfig {
    fn default() -> Self {
        Self {
            dataset_url: DEFAULT_DATASET_URL.into(),
            app_token: None,
            timeout: Duration::from_secs(30),
            row_limit: 50_000,
        }
    }
}

pub struct SocrataProvider {
    http: Client,
    dataset_url: Url,
    app_token: Option<String>,
    row_limit: u32,
}

impl SocrataProvider {
    pub fn new(config: SocrataConfig) -> Result<Self, ProviderError> {
        let dataset_url = Url::parse(&config.dataset_url)?;
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            dataset_url,
            app_token: config.app_token.filter(|token| !token.trim().is_empty()),
            row_limit: config.row_limit,
        })
    }

    fn grouped_counts_url(
        &self,
        filter: &CountFilter,
        group_by: &[Dimension],
    ) -> Result<Url, ProviderError> {
        let mut columns = Vec::with_capacity(group_by.len());
        for dimension in group_by {
            if *dimension == Dimension::Species {
                return Err(ProviderError::UnsupportedDimension(*dimension));
            }
            columns.push(dimension.column());
        }

        let mut select = columns.clone();
        select.push(COUNT_EXPR);

        let mut url = self.dataset_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("$select", &select.join(","));
            if let Some(species) = &filter.species {
                query.append_pair("$where", &species_clause(species));
            }
            if !columns.is_empty() {
                query.append_pair("$group", &columns.join(","));
            }
            query.append_pair("$limit", &self.row_limit.to_string());
        }
        Ok(url)
    }

    fn distinct_values_url(&self, dimension: Dimension) -> Url {
        let column = dimension.column();
        let mut url = self.dataset_url.clone();
        url.query_pairs_mut()
            .append_pair("$select", &format!("{column},{COUNT_EXPR}"))
            .append_pair("$group", column)
            .append_pair("$order", column)
            .append_pair("$limit", &self.row_limit.to_string());
        url
    }

    async fn get_objects(&self, url: Url) -> Result<Vec<Map<String, Value>>, ProviderError> {
        debug!(%url, "querying dataset");
        let mut request = self.http.get(url);
        if let Some(token) = &self.app_token {
            request = request.header(APP_TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY_BYTES);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let rows: Vec<Value> = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Format(format!("expected a JSON array of rows: {e}")))?;
        rows.into_iter()
            .map(|row| match row {
                Value::Object(map) => Ok(map),
                other => Err(ProviderError::Format(format!(
                    "expected a JSON object per row, got {other}"
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl DataProvider for SocrataProvider {
    async fn fetch_grouped_counts(
        &self,
        filter: &CountFilter,
        group_by: &[Dimension],
    ) -> Result<Vec<RawCountRow>, ProviderError> {
        let url = self.grouped_counts_url(filter, group_by)?;
        let objects = self.get_objects(url).await?;
        objects.iter().map(parse_count_row).collect()
    }

    async fn fetch_distinct_values(
        &self,
        dimension: Dimension,
    ) -> Result<Vec<Option<String>>, ProviderError> {
        let url = self.distinct_values_url(dimension);
        let objects = self.get_objects(url).await?;
        objects
            .iter()
            .map(|row| text_value(row, dimension.column()))
            .collect()
    }
}

/// SoQL string literals escape a single quote by doubling it.
fn species_clause(species: &str) -> String {
    format!(
        "{}='{}'",
        Dimension::Species.column(),
        species.replace('\'', "''")
    )
}

fn parse_count_row(row: &Map<String, Value>) -> Result<RawCountRow, ProviderError> {
    let count = row
        .get(COUNT_COLUMN)
        .ok_or_else(|| ProviderError::Format(format!("row is missing '{COUNT_COLUMN}'")))?;
    Ok(RawCountRow {
        borough: text_value(row, Dimension::Borough.column())?,
        steward: text_value(row, Dimension::Steward.column())?,
        health: text_value(row, Dimension::Health.column())?,
        count: parse_count(count)?,
    })
}

fn text_value(row: &Map<String, Value>, column: &str) -> Result<Option<String>, ProviderError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(ProviderError::Format(format!(
            "column '{column}' has non-scalar value {other}"
        ))),
    }
}

fn parse_count(value: &Value) -> Result<u64, ProviderError> {
    let parsed = match value {
        Value::String(text) => text.trim().parse::<u64>().ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| ProviderError::Format(format!("invalid count value {value}")))
}

fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
#[path = "tests/socrata_tests.rs"]
mod tests;
