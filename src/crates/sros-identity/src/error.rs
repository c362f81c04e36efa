//! # 密钥库错误定义
//!
//! 密钥库创建、身份签发、签名与验证过程中的错误类型。

use error::{ErrorCategory, ErrorInfo, ErrorKind, ErrorSeverity};
use std::fmt;

use crate::config::ConfigError;

/// 密钥库错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystoreError {
    /// 创建密钥库失败
    Creation(String),

    /// 目录不是有效的密钥库
    InvalidKeystore(String),

    /// 签发身份失败
    IdentityProvisioning {
        identity: String,
        reason: String,
    },

    /// 签名失败
    Signing {
        identity: String,
        reason: String,
    },

    /// 签名或内容校验失败
    Verification(String),

    /// 配置错误
    Config(ConfigError),

    /// 文件或身份不存在
    NotFound(String),

    /// IO 错误
    Io(String),
}

impl KeystoreError {
    pub(crate) fn provisioning(identity: &str, reason: impl fmt::Display) -> Self {
        KeystoreError::IdentityProvisioning { identity: identity.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn signing(identity: &str, reason: impl fmt::Display) -> Self {
        KeystoreError::Signing { identity: identity.to_string(), reason: reason.to_string() }
    }
}

impl fmt::Display for KeystoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeystoreError::Creation(msg) => write!(f, "创建密钥库失败: {}", msg),
            KeystoreError::InvalidKeystore(path) => write!(f, "'{}' 不是有效的密钥库", path),
            KeystoreError::IdentityProvisioning { identity, reason } => {
                write!(f, "签发身份 {} 失败: {}", identity, reason)
            }
            KeystoreError::Signing { identity, reason } => {
                write!(f, "为身份 {} 签名失败: {}", identity, reason)
            }
            KeystoreError::Verification(msg) => write!(f, "验证失败: {}", msg),
            KeystoreError::Config(err) => write!(f, "配置错误: {}", err),
            KeystoreError::NotFound(path) => write!(f, "不存在: {}", path),
            KeystoreError::Io(msg) => write!(f, "IO错误: {}", msg),
        }
    }
}

impl std::error::Error for KeystoreError {}

impl ErrorKind for KeystoreError {
    fn error_code(&self) -> u32 {
        match self {
            KeystoreError::Creation(_) => 5001,
            KeystoreError::InvalidKeystore(_) => 5002,
            KeystoreError::IdentityProvisioning { .. } => 5003,
            KeystoreError::Signing { .. } => 5004,
            KeystoreError::Verification(_) => 5005,
            KeystoreError::Config(_) => 5006,
            KeystoreError::NotFound(_) => 404,
            KeystoreError::Io(_) => 500,
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            KeystoreError::Signing { .. } | KeystoreError::Verification(_) => ErrorCategory::Signing,
            KeystoreError::Config(_) => ErrorCategory::Configuration,
            KeystoreError::NotFound(_) => ErrorCategory::FileSystem,
            KeystoreError::Io(_) => ErrorCategory::Io,
            _ => ErrorCategory::Keystore,
        }
    }
}

impl From<KeystoreError> for ErrorInfo {
    fn from(err: KeystoreError) -> Self {
        let severity = match &err {
            // 创建或签发中途失败时密钥库可能只写了一半
            KeystoreError::Creation(_) | KeystoreError::IdentityProvisioning { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        };
        ErrorInfo::from_kind(&err).with_severity(severity)
    }
}

impl From<ConfigError> for KeystoreError {
    fn from(err: ConfigError) -> Self {
        KeystoreError::Config(err)
    }
}

impl From<std::io::Error> for KeystoreError {
    fn from(err: std::io::Error) -> Self {
        KeystoreError::Io(err.to_string())
    }
}
