//! HMAC-SHA256 integrity tags over the canonical metric form.

use crate::error::{MetricError, Result};
use crate::metric::Metric;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(key: &str, input: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| MetricError::Crypto(e.to_string()))?;
    mac.update(input);
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `input`; empty when `key` is empty.
pub fn hmac_hex(key: &str, input: &[u8]) -> Result<String> {
    if key.is_empty() {
        return Ok(String::new());
    }
    Ok(hex::encode(mac_for(key, input)?.finalize().into_bytes()))
}

impl Metric {
    /// Computes the integrity tag for this metric.
    ///
    /// ```
    /// use metrik_common::metric::Metric;
    ///
    /// let m = Metric::gauge("X", 1.5);
    /// assert_eq!(m.sign("").unwrap(), "");
    /// assert_eq!(m.sign("s3cret").unwrap().len(), 64);
    /// ```
    pub fn sign(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Ok(String::new());
        }
        hmac_hex(key, self.canonical()?.as_bytes())
    }

    /// Returns the metric with `hash` set for `key`, or cleared when `key` is empty.
    pub fn signed(mut self, key: &str) -> Result<Self> {
        let hash = self.sign(key)?;
        self.hash = (!hash.is_empty()).then_some(hash);
        Ok(self)
    }

    /// Checks `hash` against the tag computed with `key`. A no-op for an empty key.
    pub fn verify(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }
        let mismatch = || MetricError::SignFailed(self.id.clone());
        let tag = self.hash.as_deref().ok_or_else(mismatch)?;
        let tag = hex::decode(tag).map_err(|_| mismatch())?;
        mac_for(key, self.canonical()?.as_bytes())?
            .verify_slice(&tag)
            .map_err(|_| mismatch())
    }
}
