//! # 证书颁发机构
//!
//! 密钥库唯一的 CA：签发身份证书，同时为权限文件和治理文档签名。
//!
//! 重新打开密钥库时，CA 参数由证书中的主题信息重建，私钥通过一次
//! 签名/验签测试确认与证书匹配。

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, SerialNumber, SigningKey,
};
use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::parse_x509_certificate;

use crate::config::KeystoreConfig;
use crate::error::KeystoreError;

/// 签名算法名称，写入签名信封
pub const SIGNATURE_ALGORITHM: &str = "ECDSA-P256-SHA256";

/// 新签发的身份证书
#[derive(Debug, Clone)]
pub struct IdentityCertificate {
    pub key_pem: String,
    pub certificate_pem: String,
    pub request_pem: String,
    pub not_after: OffsetDateTime,
}

/// 证书颁发机构
pub struct CertificateAuthority {
    key: KeyPair,
    params: CertificateParams,
    certificate_pem: String,
    common_name: String,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority").field("common_name", &self.common_name).finish()
    }
}

impl CertificateAuthority {
    /// 生成新的自签名 CA
    pub fn create(config: &KeystoreConfig) -> Result<Self, KeystoreError> {
        info!("生成 CA 证书: {}", config.ca_common_name);

        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CountryName, config.country_code.as_str());
        distinguished_name.push(DnType::OrganizationName, config.organization_name.as_str());
        distinguished_name.push(DnType::CommonName, config.ca_common_name.as_str());

        let now = OffsetDateTime::now_utc();
        let mut params = ca_params(distinguished_name);
        params.not_before = now;
        params.not_after = now + Duration::days(i64::from(config.ca_validity_days));

        let key = KeyPair::generate()
            .map_err(|e| KeystoreError::Creation(format!("生成CA密钥对失败: {}", e)))?;
        let certificate = params
            .self_signed(&key)
            .map_err(|e| KeystoreError::Creation(format!("创建CA证书失败: {}", e)))?;

        Ok(Self {
            certificate_pem: certificate.pem(),
            key,
            params,
            common_name: config.ca_common_name.clone(),
        })
    }

    /// 从磁盘上的私钥和证书恢复 CA
    pub fn load(key_pem: &str, certificate_pem: &str) -> Result<Self, KeystoreError> {
        let key = KeyPair::from_pem(key_pem)
            .map_err(|e| KeystoreError::InvalidKeystore(format!("解析CA私钥失败: {}", e)))?;

        let der = pem_to_der(certificate_pem)?;
        let (_, certificate) = parse_x509_certificate(&der)
            .map_err(|e| KeystoreError::InvalidKeystore(format!("解析CA证书失败: {}", e)))?;

        let mut distinguished_name = DistinguishedName::new();
        let subject = certificate.subject();
        let mut common_name = String::new();
        let attributes = [
            (DnType::CountryName, subject.iter_country().next()),
            (DnType::OrganizationName, subject.iter_organization().next()),
            (DnType::CommonName, subject.iter_common_name().next()),
        ];
        for (dn_type, attribute) in attributes {
            if let Some(value) = attribute.and_then(|a| a.as_str().ok()) {
                if dn_type == DnType::CommonName {
                    common_name = value.to_string();
                }
                distinguished_name.push(dn_type, value);
            }
        }

        let authority = Self {
            key,
            params: ca_params(distinguished_name),
            certificate_pem: certificate_pem.to_string(),
            common_name,
        };
        authority.check_key_matches(&certificate)?;

        debug!("已加载 CA: {}", authority.common_name);
        Ok(authority)
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn key_pem(&self) -> String {
        self.key.serialize_pem()
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// 为身份生成密钥、CSR，并用 CA 签发证书
    ///
    /// 证书主题的 CN 就是身份路径。
    pub fn issue(
        &self,
        identity: &str,
        serial: u64,
        validity_days: u32,
    ) -> Result<IdentityCertificate, KeystoreError> {
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, identity);

        let now = OffsetDateTime::now_utc();
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name;
        params.not_before = now;
        params.not_after = now + Duration::days(i64::from(validity_days));
        params.key_usages.push(KeyUsagePurpose::DigitalSignature);
        params.key_usages.push(KeyUsagePurpose::KeyEncipherment);
        params.extended_key_usages.push(ExtendedKeyUsagePurpose::ClientAuth);
        params.extended_key_usages.push(ExtendedKeyUsagePurpose::ServerAuth);

        let key = KeyPair::generate().map_err(|e| KeystoreError::provisioning(identity, e))?;
        // CSR 不能携带序列号，序列号只写入签发的证书
        let request = params
            .serialize_request(&key)
            .and_then(|csr| csr.pem())
            .map_err(|e| KeystoreError::provisioning(identity, format!("生成CSR失败: {}", e)))?;

        params.serial_number = Some(SerialNumber::from(serial));
        let issuer = Issuer::new(self.params.clone(), &self.key);
        let certificate = params
            .signed_by(&key, &issuer)
            .map_err(|e| KeystoreError::provisioning(identity, format!("签发证书失败: {}", e)))?;

        info!("CA {} 为 {} 签发证书，序列号 {:X}", self.common_name, identity, serial);
        Ok(IdentityCertificate {
            key_pem: key.serialize_pem(),
            certificate_pem: certificate.pem(),
            request_pem: request,
            not_after: params.not_after,
        })
    }

    /// 用 CA 私钥签名，返回 ASN.1 DER 编码的 ECDSA 签名
    pub fn sign(&self, content: &[u8]) -> Result<Vec<u8>, rcgen::Error> {
        self.key.sign(content)
    }

    fn check_key_matches(&self, certificate: &X509Certificate<'_>) -> Result<(), KeystoreError> {
        let probe = b"sros-ca-key-check";
        let signature = self
            .sign(probe)
            .map_err(|e| KeystoreError::InvalidKeystore(format!("CA私钥无法签名: {}", e)))?;

        let public_key = &certificate.public_key().subject_public_key.data[..];
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
            .verify(probe, &signature)
            .map_err(|_| KeystoreError::InvalidKeystore("CA私钥与证书不匹配".to_string()))
    }
}

fn ca_params(distinguished_name: DistinguishedName) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages.push(KeyUsagePurpose::DigitalSignature);
    params.key_usages.push(KeyUsagePurpose::KeyCertSign);
    params.key_usages.push(KeyUsagePurpose::CrlSign);
    params
}

/// 取出 PEM 中的 DER 内容
pub fn pem_to_der(text: &str) -> Result<Vec<u8>, KeystoreError> {
    pem::parse(text)
        .map(|block| block.into_contents())
        .map_err(|e| KeystoreError::Verification(format!("无效的PEM: {}", e)))
}
