//! HTTP transport for metric reports
//!
//! Each send is a single attempt; a transport error or a non-2xx response is
//! returned to the caller.

use crate::config::SendMode;
use crate::domain::message::MetricMessage;
use crate::domain::metric::Metric;
use crate::infrastructure::core::{HttpClientFactory, base_url};
use anyhow::{Context, Result, bail};
use reqwest::{Client, Response};
use tracing::debug;

#[derive(Clone)]
pub struct MetricSender {
    client: Client,
    base_url: String,
    key: Option<String>,
}

impl MetricSender {
    pub fn new(address: &str, key: Option<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url(address),
            key,
        }
    }

    pub async fn send(&self, mode: SendMode, metrics: &[Metric]) -> Result<()> {
        match mode {
            SendMode::Batch => self.send_batch(metrics).await,
            SendMode::Json => {
                for metric in metrics {
                    self.send_json(metric).await?;
                }
                Ok(())
            }
            SendMode::Url => {
                for metric in metrics {
                    self.send_by_url(metric).await?;
                }
                Ok(())
            }
        }
    }

    fn signed(&self, metric: &Metric) -> Result<MetricMessage> {
        metric
            .to_message()
            .signed_with(self.key.as_deref())
            .with_context(|| format!("Failed to sign metric {}", metric.name))
    }

    /// `POST /updates/` with every metric in one signed array
    pub async fn send_batch(&self, metrics: &[Metric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }
        let messages = metrics
            .iter()
            .map(|metric| self.signed(metric))
            .collect::<Result<Vec<_>>>()?;

        let url = format!("{}/updates/", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&messages)
            .send()
            .await
            .context("Failed to send metric batch")?;
        Self::check(response, &url).await?;
        debug!("Sent batch of {} metrics", messages.len());
        Ok(())
    }

    /// `POST /update/` with one signed message
    pub async fn send_json(&self, metric: &Metric) -> Result<()> {
        let message = self.signed(metric)?;
        let url = format!("{}/update/", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&message)
            .send()
            .await
            .with_context(|| format!("Failed to send metric {}", metric.name))?;
        Self::check(response, &url).await
    }

    /// `POST /update/{kind}/{name}/{value}`
    pub async fn send_by_url(&self, metric: &Metric) -> Result<()> {
        let url = format!(
            "{}/update/{}/{}/{}",
            self.base_url,
            metric.kind(),
            metric.name,
            metric.value.path_string()
        );
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .send()
            .await
            .with_context(|| format!("Failed to send metric {}", metric.name))?;
        Self::check(response, &url).await
    }

    async fn check(response: Response, url: &str) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} responded {}: {}", url, status, body.trim());
        }
        Ok(())
    }
}
