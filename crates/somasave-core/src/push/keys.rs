//! Key encoding for push subscriptions.
//!
//! The application server key is published base64url without padding;
//! the platform wants raw bytes. Subscription keys go the other way and
//! the backend expects standard base64 with padding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Application server key is empty")]
    Empty,

    #[error("Invalid application server key: {0}")]
    Decode(String),
}

/// Pad to a multiple of four and translate the url-safe alphabet
/// (`-`, `_`) to the standard one (`+`, `/`).
pub fn to_standard_base64(key: &str) -> String {
    let key = key.trim();
    let padding = (4 - key.len() % 4) % 4;
    let mut out: String = key
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    out.extend(std::iter::repeat('=').take(padding));
    out
}

pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, KeyError> {
    if key.trim().is_empty() {
        return Err(KeyError::Empty);
    }
    STANDARD
        .decode(to_standard_base64(key))
        .map_err(|e| KeyError::Decode(e.to_string()))
}

/// Encode a platform key component (`p256dh`, `auth`) for the backend.
pub fn encode_key(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAPID: &str =
        "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

    #[test]
    fn test_padding_and_alphabet() {
        assert_eq!(
            to_standard_base64(VAPID),
            "BEl62iUYgUivxIkv69yViEuiBIa+Ib9+SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U="
        );
        assert_eq!(to_standard_base64("-_-_AQI"), "+/+/AQI=");
        assert_eq!(to_standard_base64("AAAA"), "AAAA");
    }

    #[test]
    fn test_decode_known_key() {
        let bytes = decode_application_server_key(VAPID).unwrap();
        assert_eq!(bytes.len(), 65);
        assert_eq!(&bytes[..8], &[4, 73, 122, 218, 37, 24, 129, 72]);
        assert_eq!(&bytes[61..], &[217, 44, 135, 197]);
    }

    #[test]
    fn test_decode_url_safe_bytes() {
        assert_eq!(
            decode_application_server_key("-_-_AQI").unwrap(),
            vec![0xfb, 0xff, 0xbf, 0x01, 0x02]
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_application_server_key("  "), Err(KeyError::Empty));
        assert!(matches!(decode_application_server_key("not*base64"), Err(KeyError::Decode(_))));
    }

    #[test]
    fn test_encode_is_standard_padded() {
        assert_eq!(encode_key(&[0xfb, 0xff, 0xbf, 0x01, 0x02]), "+/+/AQI=");
        let sixteen: Vec<u8> = (0..16).collect();
        assert_eq!(encode_key(&sixteen), "AAECAwQFBgcICQoLDA0ODw==");
    }
}
