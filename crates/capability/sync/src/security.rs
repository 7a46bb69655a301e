//! 网络 securityData 加解密
//!
//! 每个网络一把随机 256 位密钥，以十六进制保存为协议数据 `nk<networkId>`；
//! 密文格式为 hex(nonce ‖ sealed JSON)，算法为 XChaCha20-Poly1305。

use crate::error::SyncError;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use domain::{Id, SecurityData};

const NONCE_LEN: usize = 24;

/// 保存网络密钥的协议数据标识。
pub fn key_identifier(network_id: Id) -> String {
    format!("nk{}", network_id)
}

/// 生成新的网络密钥（十六进制）。
pub fn generate_key() -> String {
    hex::encode(XChaCha20Poly1305::generate_key(&mut OsRng))
}

fn cipher(key_hex: &str) -> Result<XChaCha20Poly1305, SyncError> {
    let key = hex::decode(key_hex).map_err(|err| SyncError::Security(format!("key: {}", err)))?;
    XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| SyncError::Security("key length must be 32 bytes".to_string()))
}

pub fn encrypt(key_hex: &str, data: &SecurityData) -> Result<String, SyncError> {
    let cipher = cipher(key_hex)?;
    let plaintext = serde_json::to_vec(data).map_err(|err| SyncError::Security(err.to_string()))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_ref())
        .map_err(|_| SyncError::Security("encryption failed".to_string()))?;
    let mut out = nonce.to_vec();
    out.extend_from_slice(&sealed);
    Ok(hex::encode(out))
}

pub fn decrypt(key_hex: &str, ciphertext: &str) -> Result<SecurityData, SyncError> {
    let cipher = cipher(key_hex)?;
    let raw = hex::decode(ciphertext)
        .map_err(|err| SyncError::Security(format!("ciphertext: {}", err)))?;
    if raw.len() <= NONCE_LEN {
        return Err(SyncError::Security("ciphertext too short".to_string()));
    }
    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|_| SyncError::Security("decryption failed".to_string()))?;
    serde_json::from_slice(&plaintext).map_err(|err| SyncError::Security(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SecurityData {
        serde_json::from_value(json!({
            "authorized": true,
            "username": "admin",
            "password": "secret"
        }))
        .expect("security data")
    }

    #[test]
    fn sealed_data_opens_with_same_key_only() {
        let key = generate_key();
        assert_eq!(key.len(), 64);
        let sealed = encrypt(&key, &sample()).expect("encrypt");
        assert!(!sealed.contains("secret"));
        assert_eq!(decrypt(&key, &sealed).expect("decrypt"), sample());

        let other = generate_key();
        let err = decrypt(&other, &sealed).expect_err("wrong key");
        assert!(matches!(err, SyncError::Security(_)));
    }

    #[test]
    fn each_encryption_uses_fresh_nonce() {
        let key = generate_key();
        let first = encrypt(&key, &sample()).expect("encrypt");
        let second = encrypt(&key, &sample()).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(decrypt(&generate_key(), "abcd").is_err());
        assert!(encrypt("00", &sample()).is_err());
        assert_eq!(key_identifier(12), "nk12");
    }
}
