use crate::error::{MetricError, Result};
use crate::format;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The two metric types understood by agent and server.
///
/// ```
/// use metrik_common::metric::MetricKind;
///
/// let kind: MetricKind = "gauge".parse().unwrap();
/// assert_eq!(kind, MetricKind::Gauge);
/// assert_eq!(MetricKind::Counter.to_string(), "counter");
/// assert!("".parse::<MetricKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
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

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(MetricError::InvalidType),
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricError::UnknownType(other.to_string())),
        }
    }
}

/// Typed payload of a metric. The variant fixes the metric type; the inner
/// option is `None` when the metric only identifies a series (lookups, deletes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(Option<f64>),
    Counter(Option<i64>),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Gauge => MetricValue::Gauge(None),
            MetricKind::Counter => MetricValue::Counter(None),
        }
    }

    pub fn is_present(&self) -> bool {
        match self {
            MetricValue::Gauge(v) => v.is_some(),
            MetricValue::Counter(d) => d.is_some(),
        }
    }
}

/// Untyped input accepted by [`Metric::with_value`].
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    /// Decimal text, parsed according to the metric type.
    Text(&'a str),
    /// A float; truncated to an integer for counters.
    Float(f64),
    /// An integer; widened to a float for gauges.
    Int(i64),
}

impl<'a> From<&'a str> for RawValue<'a> {
    fn from(s: &'a str) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue<'_> {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<i64> for RawValue<'_> {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

/// Identity of a series inside a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub kind: MetricKind,
    pub id: String,
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A gauge or counter sample.
///
/// `Display` renders the short form `{type}/{id}/{value}`; the alternate flag
/// (`{:#}`) renders a multi-line description. `FromStr` parses the short form.
///
/// ```
/// use metrik_common::metric::Metric;
///
/// let m = Metric::with_value("gauge", "Temp", "21.5").unwrap();
/// assert_eq!(m.to_string(), "gauge/Temp/21.500000");
/// let back: Metric = "gauge/Temp/21.500000".parse().unwrap();
/// assert_eq!(back, m);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricPayload", try_from = "MetricPayload")]
pub struct Metric {
    pub id: String,
    pub value: MetricValue,
    pub hash: Option<String>,
}

impl Metric {
    /// Creates a metric without a payload after validating type and id.
    pub fn new(kind: &str, id: &str) -> Result<Self> {
        let kind: MetricKind = kind.parse()?;
        if id.is_empty() {
            return Err(MetricError::InvalidId);
        }
        Ok(Self {
            id: id.to_string(),
            value: MetricValue::empty(kind),
            hash: None,
        })
    }

    /// Creates a metric with a payload converted according to its type.
    ///
    /// ```
    /// use metrik_common::metric::Metric;
    ///
    /// let c = Metric::with_value("counter", "Hits", 7.9_f64).unwrap();
    /// assert_eq!(c.delta(), Some(7));
    /// let g = Metric::with_value("gauge", "Load", 3_i64).unwrap();
    /// assert_eq!(g.float_value(), Some(3.0));
    /// assert!(Metric::with_value("counter", "Hits", "1.5").is_err());
    /// ```
    pub fn with_value<'a>(kind: &str, id: &str, raw: impl Into<RawValue<'a>>) -> Result<Self> {
        let mut metric = Self::new(kind, id)?;
        metric.value = convert(metric.kind(), raw.into())?;
        Ok(metric)
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(Some(value)),
            hash: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(Some(delta)),
            hash: None,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    pub fn key(&self) -> MetricKey {
        MetricKey {
            kind: self.kind(),
            id: self.id.clone(),
        }
    }

    pub fn delta(&self) -> Option<i64> {
        match self.value {
            MetricValue::Counter(d) => d,
            MetricValue::Gauge(_) => None,
        }
    }

    pub fn float_value(&self) -> Option<f64> {
        match self.value {
            MetricValue::Gauge(v) => v,
            MetricValue::Counter(_) => None,
        }
    }

    pub fn has_payload(&self) -> bool {
        self.value.is_present()
    }

    /// A stored metric needs a non-empty id and a payload.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(MetricError::InvalidId);
        }
        self.require_payload()
    }

    pub fn require_payload(&self) -> Result<()> {
        match self.value {
            MetricValue::Gauge(Some(v)) if !v.is_finite() => Err(MetricError::InvalidValue(
                format!("gauge '{}' is not finite", self.id),
            )),
            v if v.is_present() => Ok(()),
            _ => Err(MetricError::InvalidValue(format!(
                "{} '{}' has no {}",
                self.kind(),
                self.id,
                match self.kind() {
                    MetricKind::Gauge => "value",
                    MetricKind::Counter => "delta",
                }
            ))),
        }
    }

    /// Value rendered with `%d` for counters and six fraction digits for
    /// gauges; empty when the payload is absent.
    pub fn value_repr(&self) -> String {
        match self.value {
            MetricValue::Gauge(Some(v)) => format::fixed(v),
            MetricValue::Counter(Some(d)) => d.to_string(),
            _ => String::new(),
        }
    }

    /// Value as returned by plaintext reads: shortest form for gauges.
    pub fn plain_value(&self) -> Option<String> {
        match self.value {
            MetricValue::Gauge(v) => v.map(format::shortest),
            MetricValue::Counter(d) => d.map(|d| d.to_string()),
        }
    }

    /// The exact byte sequence covered by the integrity tag.
    pub fn canonical(&self) -> Result<String> {
        if !self.has_payload() {
            return Err(MetricError::InvalidValue(format!(
                "cannot sign {} '{}' without a payload",
                self.kind(),
                self.id
            )));
        }
        Ok(format!("{}:{}:{}", self.id, self.kind(), self.value_repr()))
    }

    /// Template parameters used to build update URLs.
    pub fn path_params(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("type", self.kind().to_string()),
            ("id", self.id.clone()),
            ("value", self.value_repr()),
        ])
    }
}

fn convert(kind: MetricKind, raw: RawValue<'_>) -> Result<MetricValue> {
    match (kind, raw) {
        (MetricKind::Gauge, RawValue::Text(s)) => {
            let v: f64 = s
                .trim()
                .parse()
                .map_err(|_| MetricError::InvalidValue(format!("'{s}' is not a float")))?;
            finite(v).map(|v| MetricValue::Gauge(Some(v)))
        }
        (MetricKind::Gauge, RawValue::Float(v)) => finite(v).map(|v| MetricValue::Gauge(Some(v))),
        (MetricKind::Gauge, RawValue::Int(i)) => Ok(MetricValue::Gauge(Some(i as f64))),
        (MetricKind::Counter, RawValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(|d| MetricValue::Counter(Some(d)))
            .map_err(|_| MetricError::InvalidValue(format!("'{s}' is not an integer"))),
        (MetricKind::Counter, RawValue::Float(v)) => {
            finite(v).map(|v| MetricValue::Counter(Some(v as i64)))
        }
        (MetricKind::Counter, RawValue::Int(i)) => Ok(MetricValue::Counter(Some(i))),
    }
}

fn finite(v: f64) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(MetricError::InvalidValue(format!("{v} is not a finite number")))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            return write!(f, "{}/{}/{}", self.kind(), self.id, self.value_repr());
        }

        let delta = self.delta().map(|d| d.to_string());
        let value = self.float_value().map(format::fixed);
        writeln!(f, "id:    {}", self.id)?;
        writeln!(f, "type:  {}", self.kind())?;
        writeln!(f, "hash:  {}", self.hash.as_deref().unwrap_or("-"))?;
        writeln!(f, "delta: {}", delta.as_deref().unwrap_or("-"))?;
        write!(f, "value: {}", value.as_deref().unwrap_or("-"))
    }
}

impl FromStr for Metric {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '/');
        let kind = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();
        match parts.next() {
            Some(value) if !value.is_empty() => Self::with_value(kind, id, value),
            _ => Self::new(kind, id),
        }
    }
}

/// JSON shape of a metric on the wire and on disk.
///
/// `value` is present only for gauges and `delta` only for counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl From<Metric> for MetricPayload {
    fn from(m: Metric) -> Self {
        Self {
            kind: m.kind().to_string(),
            delta: m.delta(),
            value: m.float_value(),
            id: m.id,
            hash: m.hash,
        }
    }
}

impl TryFrom<MetricPayload> for Metric {
    type Error = MetricError;

    fn try_from(p: MetricPayload) -> Result<Self> {
        let kind: MetricKind = p.kind.parse()?;
        if p.id.is_empty() {
            return Err(MetricError::InvalidId);
        }
        let value = match kind {
            MetricKind::Gauge => MetricValue::Gauge(p.value.map(finite).transpose()?),
            MetricKind::Counter => MetricValue::Counter(p.delta),
        };
        Ok(Self {
            id: p.id,
            value,
            hash: p.hash.filter(|h| !h.is_empty()),
        })
    }
}
