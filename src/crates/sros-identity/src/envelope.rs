//! # 签名信封
//!
//! `*.p7s` 文件的格式：一个 `SIGNED ENVELOPE` PEM 块，内容是 JSON，
//! 包含被签名的原文、摘要、签名和签名者证书。验证时要求签名者证书
//! 与受信任的 CA 证书完全一致。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x509_parser::prelude::parse_x509_certificate;

use crate::ca::{pem_to_der, CertificateAuthority, SIGNATURE_ALGORITHM};
use crate::error::KeystoreError;

/// PEM 标签
pub const ENVELOPE_TAG: &str = "SIGNED ENVELOPE";

/// 已签名的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub algorithm: String,
    /// 原文 SHA-256 摘要（十六进制）
    pub digest: String,
    /// 原文（base64）
    pub content: String,
    /// DER 编码的签名（base64）
    pub signature: String,
    /// 签名者证书 PEM
    pub signer: String,
    /// RFC 3339 签名时间
    pub signed_at: String,
}

impl SignedEnvelope {
    /// 用 CA 签名内容
    pub fn seal(content: &[u8], authority: &CertificateAuthority) -> Result<Self, KeystoreError> {
        let signature = authority
            .sign(content)
            .map_err(|e| KeystoreError::Verification(format!("签名失败: {}", e)))?;

        Ok(Self {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            digest: hex::encode(Sha256::digest(content)),
            content: STANDARD.encode(content),
            signature: STANDARD.encode(signature),
            signer: authority.certificate_pem().to_string(),
            signed_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn to_pem(&self) -> Result<String, KeystoreError> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| KeystoreError::Verification(format!("序列化签名信封失败: {}", e)))?;
        Ok(pem::encode(&pem::Pem::new(ENVELOPE_TAG, body)))
    }

    pub fn from_pem(text: &str) -> Result<Self, KeystoreError> {
        let block = pem::parse(text)
            .map_err(|e| KeystoreError::Verification(format!("无效的签名信封: {}", e)))?;
        if block.tag() != ENVELOPE_TAG {
            return Err(KeystoreError::Verification(format!(
                "签名信封标签应为 {:?}，实际为 {:?}",
                ENVELOPE_TAG,
                block.tag()
            )));
        }
        serde_json::from_slice(block.contents())
            .map_err(|e| KeystoreError::Verification(format!("无法解析签名信封: {}", e)))
    }

    /// 验证信封并返回原文
    ///
    /// 依次检查：签名者证书等于受信任证书、算法、摘要、签名。
    pub fn verify(&self, trusted_certificate_pem: &str) -> Result<Vec<u8>, KeystoreError> {
        let trusted = pem_to_der(trusted_certificate_pem)?;
        if pem_to_der(&self.signer)? != trusted {
            return Err(KeystoreError::Verification("签名者不是受信任的CA".to_string()));
        }
        if self.algorithm != SIGNATURE_ALGORITHM {
            return Err(KeystoreError::Verification(format!("不支持的签名算法: {}", self.algorithm)));
        }

        let content = decode(&self.content, "内容")?;
        if hex::encode(Sha256::digest(&content)) != self.digest {
            return Err(KeystoreError::Verification("内容摘要不匹配".to_string()));
        }

        let signature = decode(&self.signature, "签名")?;
        let (_, certificate) = parse_x509_certificate(&trusted)
            .map_err(|e| KeystoreError::Verification(format!("解析签名者证书失败: {}", e)))?;
        let public_key = &certificate.public_key().subject_public_key.data[..];
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
            .verify(&content, &signature)
            .map_err(|_| KeystoreError::Verification("签名无效".to_string()))?;

        Ok(content)
    }
}

fn decode(value: &str, what: &str) -> Result<Vec<u8>, KeystoreError> {
    STANDARD
        .decode(value)
        .map_err(|e| KeystoreError::Verification(format!("{}不是合法的 base64: {}", what, e)))
}
