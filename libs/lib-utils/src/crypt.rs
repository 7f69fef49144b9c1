use base64::{engine::general_purpose::STANDARD, Engine};

#[derive(Debug)]
pub enum Error {
    EncryptFailed(anyhow::Error),
    DecryptFailed(anyhow::Error),
    DecodeFailed(base64::DecodeError),
    StringConversionFailed(std::string::FromUtf8Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EncryptFailed(e) => write!(f, "Encrypt failed: {}", e),
            Error::DecryptFailed(e) => write!(f, "Decrypt failed: {}", e),
            Error::DecodeFailed(e) => write!(f, "Decode failed: {}", e),
            Error::StringConversionFailed(e) => write!(f, "String conversion failed: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// Encrypt plaintext with the given key, returning a base64 string safe to
/// write to disk.
pub fn encrypt(plaintext: &str, key: &str) -> Result<String, Error> {
    let encrypted = simple_crypt::encrypt(plaintext.as_bytes(), key.as_bytes())
        .map_err(Error::EncryptFailed)?;
    Ok(STANDARD.encode(encrypted))
}

/// Decrypt a base64 string previously produced by [`encrypt`].
pub fn decrypt(encoded: &str, key: &str) -> Result<String, Error> {
    let encrypted = STANDARD.decode(encoded).map_err(Error::DecodeFailed)?;
    let decrypted =
        simple_crypt::decrypt(&encrypted, key.as_bytes()).map_err(Error::DecryptFailed)?;
    String::from_utf8(decrypted).map_err(Error::StringConversionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = "test-key";
        let encoded = encrypt("ya29.a0AfB_secret_token", key).unwrap();
        assert_ne!(encoded, "ya29.a0AfB_secret_token");
        let decoded = decrypt(&encoded, key).unwrap();
        assert_eq!(decoded, "ya29.a0AfB_secret_token");
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let encoded = encrypt("secret", "key-a").unwrap();
        assert!(decrypt(&encoded, "key-b").is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            decrypt("not base64 !!!", "key"),
            Err(Error::DecodeFailed(_))
        ));
    }
}
