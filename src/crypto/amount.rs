//! Field-level encryption of monetary amounts.
//!
//! Amounts are stored as `<hex-iv>:<hex-ciphertext>` tokens produced with
//! AES-256-CBC and PKCS#7 padding. A fresh IV is drawn for every call, so the
//! same amount never produces the same token twice. There is no
//! authentication tag: a tampered token may fail to unpad or may decrypt to
//! some other value.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use tracing::warn;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),
    #[error("encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("malformed amount token")]
    MalformedToken,
    #[error("failed to decrypt amount token")]
    DecryptionFailure,
}

/// An amount as it arrives from a client: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    /// Accepts JSON numbers and strings, anything else is not an amount.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(AmountInput::Number),
            serde_json::Value::String(s) => Some(AmountInput::Text(s.clone())),
            _ => None,
        }
    }

    /// Parses, range checks and rounds to cents.
    pub fn to_rounded(&self) -> Result<f64, AmountError> {
        let value = match self {
            AmountInput::Number(n) => *n,
            AmountInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| AmountError::InvalidAmount("Amount must be a valid number"))?,
        };
        round_amount(value)
    }
}

impl From<f64> for AmountInput {
    fn from(value: f64) -> Self {
        AmountInput::Number(value)
    }
}

impl From<&str> for AmountInput {
    fn from(value: &str) -> Self {
        AmountInput::Text(value.to_string())
    }
}

/// Rounds half away from zero on the scaled integer.
pub fn round_amount(value: f64) -> Result<f64, AmountError> {
    if !value.is_finite() {
        return Err(AmountError::InvalidAmount("Amount must be a valid number"));
    }
    if value < 0.0 {
        return Err(AmountError::InvalidAmount("Amount cannot be negative"));
    }
    let rounded = (value * 100.0).round() / 100.0;
    if !rounded.is_finite() {
        return Err(AmountError::InvalidAmount("Amount must be a valid number"));
    }
    // -0.0 would otherwise render as "-0"
    Ok(if rounded == 0.0 { 0.0 } else { rounded })
}

#[derive(Clone)]
pub struct AmountCodec {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for AmountCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmountCodec").field("key", &"<redacted>").finish()
    }
}

impl AmountCodec {
    pub fn new(key: &[u8]) -> Result<Self, AmountError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| AmountError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    /// Validates, rounds and encrypts a client supplied amount.
    pub fn encrypt(&self, amount: &AmountInput) -> Result<String, AmountError> {
        let rounded = amount.to_rounded()?;
        self.encrypt_plain(&rounded.to_string())
    }

    fn encrypt_plain(&self, plaintext: &str) -> Result<String, AmountError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|_| AmountError::InvalidKeyLength(self.key.len()))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    pub fn decrypt(&self, token: &str) -> Result<f64, AmountError> {
        let (iv_hex, data_hex) = token.split_once(':').ok_or(AmountError::MalformedToken)?;
        if iv_hex.is_empty() || data_hex.is_empty() {
            return Err(AmountError::MalformedToken);
        }
        let iv = hex::decode(iv_hex).map_err(|_| AmountError::MalformedToken)?;
        let data = hex::decode(data_hex).map_err(|_| AmountError::MalformedToken)?;
        if iv.len() != IV_LEN {
            return Err(AmountError::MalformedToken);
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| AmountError::DecryptionFailure)?;
        let plain = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&data)
            .map_err(|_| AmountError::DecryptionFailure)?;

        let text = std::str::from_utf8(&plain).map_err(|_| AmountError::DecryptionFailure)?;
        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|_| AmountError::DecryptionFailure)?;
        if !value.is_finite() {
            return Err(AmountError::DecryptionFailure);
        }
        Ok(value)
    }

    /// Read-path decryption: an unreadable token is reported as 0.
    pub fn decrypt_or_zero(&self, token: &str, record: &str) -> f64 {
        match self.decrypt(token) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, record, "amount decryption failed; reporting 0");
                0.0
            }
        }
    }
}
