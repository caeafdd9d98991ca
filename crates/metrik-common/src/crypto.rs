//! Optional RSA encryption of request bodies between agent and server.
//!
//! Bodies are split into blocks that fit one PKCS#1 v1.5 operation; the
//! ciphertext is the concatenation of the encrypted blocks, each exactly one
//! modulus long.

use crate::error::{MetricError, Result};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::path::Path;

/// Request header marking an encrypted body.
pub const ENCRYPTION_HEADER: &str = "x-encryption";
/// Value of [`ENCRYPTION_HEADER`] for RSA-encrypted bodies.
pub const ENCRYPTION_SCHEME: &str = "rsa";

/// PKCS#1 v1.5 padding overhead per block.
const PADDING_OVERHEAD: usize = 11;

fn crypto_err(e: impl std::fmt::Display) -> MetricError {
    MetricError::Crypto(e.to_string())
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MetricError::Crypto(format!("failed to read {}: {e}", path.display())))
}

/// Agent-side encryptor holding the server's public key.
#[derive(Debug, Clone)]
pub struct PayloadEncryptor {
    key: RsaPublicKey,
}

impl PayloadEncryptor {
    /// Parses an SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(crypto_err)?;
        Ok(Self { key })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_pem(&read_pem(path)?)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let block = self.key.size() - PADDING_OVERHEAD;
        let mut rng = rand::thread_rng();
        let mut out = Vec::with_capacity(plaintext.len().div_ceil(block) * self.key.size());
        for chunk in plaintext.chunks(block) {
            let sealed = self
                .key
                .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
                .map_err(crypto_err)?;
            out.extend_from_slice(&sealed);
        }
        Ok(out)
    }
}

/// Server-side decryptor holding the private key.
#[derive(Debug, Clone)]
pub struct PayloadDecryptor {
    key: RsaPrivateKey,
}

impl PayloadDecryptor {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Parses a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(crypto_err)?;
        Ok(Self { key })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_pem(&read_pem(path)?)
    }

    /// The matching encryptor, mostly useful to tests and tooling.
    pub fn encryptor(&self) -> PayloadEncryptor {
        PayloadEncryptor {
            key: self.key.to_public_key(),
        }
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let size = self.key.size();
        if ciphertext.len() % size != 0 {
            return Err(MetricError::Crypto(format!(
                "ciphertext length {} is not a multiple of the {size}-byte block",
                ciphertext.len()
            )));
        }
        let mut out = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext.chunks(size) {
            let plain = self.key.decrypt(Pkcs1v15Encrypt, chunk).map_err(crypto_err)?;
            out.extend_from_slice(&plain);
        }
        Ok(out)
    }
}
