use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::debug;

use super::{Element, PlanSource, parse_document};
use crate::error::{AppError, Result};

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// File name prefix in front of the `yyyyMMdd.xml` part.
    pub feed_prefix: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn plan_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}{}.xml",
            self.base_url.trim_end_matches('/'),
            self.feed_prefix,
            date.format("%Y%m%d")
        )
    }
}

pub struct HttpPlanSource {
    client: Client,
    config: UpstreamConfig,
}

impl HttpPlanSource {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PlanSource for HttpPlanSource {
    async fn fetch(&self, date: NaiveDate) -> Result<Element> {
        let url = self.config.plan_url(date);
        debug!("fetching plan from {}", url);

        let response = self.client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_document(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.to_string(),
            username: "schueler".to_string(),
            password: "secret".to_string(),
            feed_prefix: "PlanKl".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_plan_url_uses_compact_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(
            config("https://plan.example.org/vpmobil/mobdaten").plan_url(date),
            "https://plan.example.org/vpmobil/mobdaten/PlanKl20240304.xml"
        );
    }

    #[test]
    fn test_plan_url_tolerates_trailing_slash() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            config("https://plan.example.org/").plan_url(date),
            "https://plan.example.org/PlanKl20241231.xml"
        );
    }
}
