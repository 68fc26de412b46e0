//! Metric value object
//!
//! A metric is a named, typed measurement. The kind is fixed by the value
//! variant and never changes for a given name:
//! - **Counter**: `i64` accumulator, updates add to the stored total
//! - **Gauge**: `f64`, updates replace the stored value

use crate::domain::errors::MetricError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(MetricKind::Counter),
            "gauge" => Ok(MetricKind::Gauge),
            _ => Err(MetricError::UnsupportedKind(s.to_string())),
        }
    }
}

/// Stored value of a metric, tagged by kind.
///
/// Serialized as `{"type": "counter", "value": 10}` so snapshot documents are
/// self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetricValue {
    Counter(i64),
    Gauge(f64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }

    /// Human-facing rendering: counters as decimal, gauges with at most
    /// three decimals and no trailing zeros.
    pub fn display_string(&self) -> String {
        match self {
            MetricValue::Counter(delta) => delta.to_string(),
            MetricValue::Gauge(value) => {
                let formatted = format!("{:.3}", value);
                formatted
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            }
        }
    }

    /// Rendering used in path-encoded updates (`/update/{kind}/{name}/{value}`)
    pub fn path_string(&self) -> String {
        match self {
            MetricValue::Counter(delta) => delta.to_string(),
            MetricValue::Gauge(value) => format!("{:.6}", value),
        }
    }
}

/// Untyped input for [`Metric::from_raw`].
///
/// Values arriving through URL segments are `Text`; values produced in-process
/// are native.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Text(&'a str),
    Int(i64),
    Float(f64),
}

impl fmt::Display for RawValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::Float(x) => write!(f, "{}", x),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Result<Self, MetricError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MetricError::EmptyName);
        }
        Ok(Self { name, value })
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Result<Self, MetricError> {
        Self::new(name, MetricValue::Counter(delta))
    }

    pub fn gauge(name: impl Into<String>, value: f64) -> Result<Self, MetricError> {
        Self::new(name, MetricValue::Gauge(value))
    }

    /// Build a metric from a kind name and an untyped value.
    ///
    /// Counters accept text or `Int`, gauges accept text or `Float`. Gauges
    /// must be finite so the value survives a JSON round trip.
    pub fn from_raw(name: &str, kind_name: &str, raw: RawValue<'_>) -> Result<Self, MetricError> {
        let kind = MetricKind::from_str(kind_name)?;
        let invalid = |reason: String| MetricError::InvalidValue {
            kind,
            raw: raw.to_string(),
            reason,
        };

        let value = match (kind, raw) {
            (MetricKind::Counter, RawValue::Text(text)) => text
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|e| invalid(e.to_string()))?,
            (MetricKind::Counter, RawValue::Int(delta)) => MetricValue::Counter(delta),
            (MetricKind::Gauge, RawValue::Text(text)) => text
                .parse::<f64>()
                .map(MetricValue::Gauge)
                .map_err(|e| invalid(e.to_string()))?,
            (MetricKind::Gauge, RawValue::Float(value)) => MetricValue::Gauge(value),
            (_, other) => {
                return Err(invalid(format!("cannot convert {:?} to {}", other, kind)));
            }
        };

        if let MetricValue::Gauge(v) = value
            && !v.is_finite()
        {
            return Err(invalid("gauge value must be finite".to_string()));
        }

        Self::new(name, value)
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Apply an incoming value: counters accumulate, gauges are replaced.
    ///
    /// The stored value is left untouched on error.
    pub fn update(&mut self, incoming: MetricValue) -> Result<(), MetricError> {
        self.value = match (self.value, incoming) {
            (MetricValue::Counter(current), MetricValue::Counter(delta)) => {
                let total = current
                    .checked_add(delta)
                    .ok_or_else(|| MetricError::CounterOverflow {
                        name: self.name.clone(),
                        current,
                        delta,
                    })?;
                MetricValue::Counter(total)
            }
            (MetricValue::Gauge(_), MetricValue::Gauge(value)) => MetricValue::Gauge(value),
            (stored, incoming) => {
                return Err(MetricError::TypeMismatch {
                    name: self.name.clone(),
                    stored: stored.kind(),
                    incoming: incoming.kind(),
                });
            }
        };
        Ok(())
    }
}
