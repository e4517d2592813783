use std::time::Duration;

use async_trait::async_trait;
use time::macros::format_description;
use tracing::{debug, instrument, warn};

use super::{decode_envelope, FeedQuery, FeedRow, MealFeed};
use crate::config::FeedConfig;
use crate::errors::FeedError;

/// Rows per page; a school never has more than three slots a day.
const PAGE_SIZE: u32 = 100;

/// reqwest-backed client for the NEIS meal feed.
#[derive(Clone)]
pub struct NeisClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl NeisClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone(),
            timeout_secs: cfg.timeout_secs,
        })
    }

    fn params(&self, query: &FeedQuery) -> Result<Vec<(&'static str, String)>, FeedError> {
        let ymd = query
            .date
            .format(format_description!("[year][month][day]"))
            .map_err(|e| FeedError::Decode(format!("format date: {e}")))?;
        Ok(vec![
            ("KEY", self.api_key.clone()),
            ("Type", "json".into()),
            ("pIndex", "1".into()),
            ("pSize", PAGE_SIZE.to_string()),
            ("ATPT_OFCDC_SC_CODE", query.office_code.clone()),
            ("SD_SCHUL_CODE", query.school_code.clone()),
            ("MLSV_YMD", ymd),
        ])
    }

    fn classify(&self, e: reqwest::Error) -> FeedError {
        if e.is_timeout() {
            FeedError::Timeout(self.timeout_secs)
        } else {
            FeedError::Network(e)
        }
    }
}

#[async_trait]
impl MealFeed for NeisClient {
    #[instrument(skip(self), fields(school_code = %query.school_code, date = %query.date))]
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<FeedRow>, FeedError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&self.params(query)?)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "feed answered with http error");
            return Err(FeedError::Upstream {
                code: status.as_u16().to_string(),
                message: body,
            });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let rows = decode_envelope(&body)?;
        debug!(rows = rows.len(), "feed rows decoded");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn client() -> NeisClient {
        NeisClient::new(&FeedConfig {
            api_key: "test-key".into(),
            base_url: "http://127.0.0.1:9/hub/mealServiceDietInfo".into(),
            timeout_secs: 1,
        })
        .expect("client builds")
    }

    #[test]
    fn request_params_carry_key_codes_and_compact_date() {
        let c = client();
        let params = c
            .params(&FeedQuery {
                school_code: "7010057".into(),
                office_code: "B10".into(),
                date: date!(2024 - 03 - 05),
            })
            .unwrap();
        assert!(params.contains(&("KEY", "test-key".to_string())));
        assert!(params.contains(&("Type", "json".to_string())));
        assert!(params.contains(&("ATPT_OFCDC_SC_CODE", "B10".to_string())));
        assert!(params.contains(&("SD_SCHUL_CODE", "7010057".to_string())));
        assert!(params.contains(&("MLSV_YMD", "20240305".to_string())));
    }

    #[tokio::test]
    async fn unreachable_feed_is_a_typed_failure() {
        let err = client()
            .fetch(&FeedQuery {
                school_code: "7010057".into(),
                office_code: "B10".into(),
                date: date!(2024 - 03 - 05),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Network(_) | FeedError::Timeout(_)));
    }
}
