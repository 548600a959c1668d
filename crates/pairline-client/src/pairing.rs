//! Pairing-code encoding for display.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::errors::ClientError;

/// Turns a raw pairing code into a payload a browser can display.
#[async_trait]
pub trait PairingEncoder: Send + Sync {
    /// Encode `code`. An empty code is an error.
    async fn encode(&self, code: &str) -> Result<String, ClientError>;
}

/// Encodes the code as a `data:text/plain;base64,...` URL.
///
/// Image rendering is left to the page, which draws the code client-side.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataUrlEncoder;

/// Prefix of every payload produced by [`DataUrlEncoder`].
pub const DATA_URL_PREFIX: &str = "data:text/plain;base64,";

#[async_trait]
impl PairingEncoder for DataUrlEncoder {
    async fn encode(&self, code: &str) -> Result<String, ClientError> {
        if code.is_empty() {
            return Err(ClientError::Encode("empty pairing code".into()));
        }
        Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(code)))
    }
}

/// Recover the raw code from a [`DataUrlEncoder`] payload.
pub fn decode_data_url(payload: &str) -> Option<String> {
    let encoded = payload.strip_prefix(DATA_URL_PREFIX)?;
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encodes_as_data_url() {
        let payload = DataUrlEncoder.encode("X123").await.unwrap();
        assert_eq!(payload, "data:text/plain;base64,WDEyMw==");
        assert_eq!(decode_data_url(&payload).as_deref(), Some("X123"));
    }

    #[tokio::test]
    async fn empty_code_is_error() {
        assert!(matches!(
            DataUrlEncoder.encode("").await,
            Err(ClientError::Encode(_))
        ));
    }

    #[test]
    fn decode_rejects_foreign_payloads() {
        assert!(decode_data_url("data:image/png;base64,AAAA").is_none());
        assert!(decode_data_url("data:text/plain;base64,***").is_none());
    }
}
