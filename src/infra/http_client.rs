use crate::app::ports::{InspectionSource, PageQuery, SourceError};
use crate::config::SourceConfig;
use crate::constants;
use crate::error::Result;
use crate::types::SourcePage;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Socrata (SODA 2.0) client for the food inspections dataset.
pub struct SocrataClient {
    client: reqwest::Client,
    url: String,
    app_token: Option<String>,
}

impl SocrataClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("food_inspections/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            app_token: config.app_token.clone(),
        })
    }

    fn query_params(query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("$limit", query.limit.to_string()),
            ("$offset", query.offset.to_string()),
            // inspection_id breaks ties so offsets stay stable across requests
            ("$order", format!("{},inspection_id", constants::DATE_FIELD)),
        ];
        if let Some(filter) = &query.filter {
            params.push(("$where", filter.to_soql()));
        }
        params
    }
}

fn classify_status(status: StatusCode) -> Option<SourceError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(SourceError::Transient(format!("HTTP {}", status.as_u16())))
    } else {
        Some(SourceError::Fatal(format!("HTTP {}", status.as_u16())))
    }
}

fn classify_reqwest(e: reqwest::Error) -> SourceError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        SourceError::Transient(e.to_string())
    } else {
        SourceError::Fatal(e.to_string())
    }
}

#[async_trait]
impl InspectionSource for SocrataClient {
    async fn fetch_page(&self, query: &PageQuery) -> std::result::Result<SourcePage, SourceError> {
        tracing::debug!(offset = query.offset, limit = query.limit, "HTTP GET {}", self.url);
        let mut request = self.client.get(&self.url).query(&Self::query_params(query));
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let resp = request.send().await.map_err(classify_reqwest)?;
        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }

        let bytes = resp.bytes().await.map_err(classify_reqwest)?;
        let rows = serde_json::from_slice::<Vec<Value>>(&bytes)
            .map_err(|e| SourceError::Fatal(format!("undecodable page: {e}")))?;
        Ok(SourcePage::decode(rows, query.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ComparisonOp, DateFilter};
    use chrono::NaiveDate;

    #[test]
    fn test_query_params_without_filter() {
        let params = SocrataClient::query_params(&PageQuery {
            limit: 50,
            offset: 100,
            filter: None,
        });
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], ("$limit", "50".to_string()));
        assert_eq!(params[1], ("$offset", "100".to_string()));
        assert_eq!(params[2].1, "inspection_date,inspection_id");
    }

    #[test]
    fn test_query_params_with_filter() {
        let params = SocrataClient::query_params(&PageQuery {
            limit: 50,
            offset: 0,
            filter: Some(DateFilter {
                start_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                op: ComparisonOp::Gt,
            }),
        });
        assert_eq!(params[3], ("$where", "inspection_date > '2024-01-08T00:00:00'".to_string()));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(SourceError::Transient(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(SourceError::Transient(_))
        ));
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST), Some(SourceError::Fatal(_))));
    }
}
