//! Wire representation of a metric and its integrity digest.
//!
//! A message carries exactly one of `delta` (counter) or `value` (gauge). When
//! a shared key is configured the `hash` field holds the hex-encoded
//! HMAC-SHA256 of `{id}:{type}:{value}`, where gauges use six decimals and
//! counters plain decimal.

use crate::domain::errors::MetricError;
use crate::domain::metric::{Metric, MetricKind, MetricValue};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::str::FromStr;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageError {
    #[error("Signing key cannot be empty")]
    EmptyKey,

    #[error("Signing key rejected: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// Outcome of [`MetricMessage::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// No key configured, integrity checking is disabled.
    Skipped,
    Valid,
    Invalid,
}

impl Verification {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verification::Invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricMessage {
    pub id: String,
    /// Kind name. Kept as text so an unknown kind can be reported as
    /// unsupported rather than as a decoding failure.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl MetricMessage {
    /// Decode the typed value carried by the message
    pub fn metric_value(&self) -> Result<MetricValue, MetricError> {
        let kind = MetricKind::from_str(&self.kind)?;
        let missing = |field| MetricError::MissingValue {
            name: self.id.clone(),
            kind,
            field,
        };
        match kind {
            MetricKind::Counter => self
                .delta
                .map(MetricValue::Counter)
                .ok_or_else(|| missing("delta")),
            MetricKind::Gauge => self
                .value
                .map(MetricValue::Gauge)
                .ok_or_else(|| missing("value")),
        }
    }

    fn canonical(&self) -> Result<String, MetricError> {
        Ok(match self.metric_value()? {
            MetricValue::Counter(delta) => format!("{}:counter:{}", self.id, delta),
            MetricValue::Gauge(value) => format!("{}:gauge:{:.6}", self.id, value),
        })
    }

    fn mac(&self, key: &str) -> Result<HmacSha256, MessageError> {
        if key.is_empty() {
            return Err(MessageError::EmptyKey);
        }
        let canonical = self.canonical()?;
        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| MessageError::InvalidKey(e.to_string()))?;
        mac.update(canonical.as_bytes());
        Ok(mac)
    }

    /// Compute the digest for `key` and store it in `hash`
    pub fn sign(&mut self, key: &str) -> Result<(), MessageError> {
        let mac = self.mac(key)?;
        self.hash = hex::encode(mac.finalize().into_bytes());
        Ok(())
    }

    /// Builder-style variant of [`sign`](Self::sign) that skips signing when
    /// no key is configured
    pub fn signed_with(mut self, key: Option<&str>) -> Result<Self, MessageError> {
        if let Some(key) = key {
            self.sign(key)?;
        }
        Ok(self)
    }

    /// Check `hash` against a digest recomputed with `key`.
    ///
    /// An empty key means integrity checking is disabled and yields
    /// [`Verification::Skipped`].
    pub fn verify(&self, key: &str) -> Result<Verification, MessageError> {
        if key.is_empty() {
            return Ok(Verification::Skipped);
        }
        let mac = self.mac(key)?;
        let Ok(expected) = hex::decode(&self.hash) else {
            return Ok(Verification::Invalid);
        };
        Ok(match mac.verify_slice(&expected) {
            Ok(()) => Verification::Valid,
            Err(_) => Verification::Invalid,
        })
    }
}

impl From<&Metric> for MetricMessage {
    fn from(metric: &Metric) -> Self {
        let (delta, value) = match metric.value {
            MetricValue::Counter(delta) => (Some(delta), None),
            MetricValue::Gauge(value) => (None, Some(value)),
        };
        Self {
            id: metric.name.clone(),
            kind: metric.kind().as_str().to_string(),
            delta,
            value,
            hash: String::new(),
        }
    }
}

impl Metric {
    pub fn to_message(&self) -> MetricMessage {
        MetricMessage::from(self)
    }
}

impl TryFrom<&MetricMessage> for Metric {
    type Error = MetricError;

    fn try_from(message: &MetricMessage) -> Result<Self, Self::Error> {
        let value = message.metric_value()?;
        if let MetricValue::Gauge(v) = value
            && !v.is_finite()
        {
            return Err(MetricError::InvalidValue {
                kind: MetricKind::Gauge,
                raw: v.to_string(),
                reason: "gauge value must be finite".to_string(),
            });
        }
        Metric::new(message.id.clone(), value)
    }
}
