//! Metric model shared by the metrik agent and server.
//!
//! A [`metric::Metric`] is either a gauge (last-write-wins float) or a counter
//! (integer). Both processes must agree bit-exactly on its wire form, its
//! display forms and its HMAC integrity tag, so all of those live here.

pub mod crypto;
pub mod error;
pub mod format;
pub mod metric;
pub mod sign;

#[cfg(test)]
mod proptests;

pub use error::MetricError;
pub use metric::{Metric, MetricKey, MetricKind, MetricPayload, MetricValue, RawValue};
