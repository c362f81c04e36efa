//! # 密钥库配置
//!
//! CA 主题信息与证书有效期。配置在创建密钥库时写入 `ca_conf.toml`，
//! 之后打开同一密钥库时沿用，保证后续签发的证书参数一致。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 有效期上限（天）
pub const MAX_VALIDITY_DAYS: u32 = 3650;

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 无效的有效期
    InvalidValidityPeriod(u32),

    /// 配置验证失败
    ValidationFailed(String),

    /// 配置文件读写失败
    Persistence(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValidityPeriod(days) => write!(f, "无效的有效期: {} 天", days),
            ConfigError::ValidationFailed(msg) => write!(f, "配置验证失败: {}", msg),
            ConfigError::Persistence(msg) => write!(f, "配置文件读写失败: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 密钥库配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// CA 证书通用名称
    pub ca_common_name: String,

    /// 组织名称
    pub organization_name: String,

    /// 国家代码
    pub country_code: String,

    /// 身份证书与权限文件有效期（天）
    pub validity_days: u32,

    /// CA 证书有效期（天）
    pub ca_validity_days: u32,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            ca_common_name: "sros2testCA".to_string(),
            organization_name: "SROS".to_string(),
            country_code: "US".to_string(),
            validity_days: 3650,
            ca_validity_days: 3650,
        }
    }
}

impl KeystoreConfig {
    pub fn builder() -> KeystoreConfigBuilder {
        KeystoreConfigBuilder::new()
    }

    /// 验证配置参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        for days in [self.validity_days, self.ca_validity_days] {
            if !(1..=MAX_VALIDITY_DAYS).contains(&days) {
                return Err(ConfigError::InvalidValidityPeriod(days));
            }
        }

        if self.country_code.len() != 2 || !self.country_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::ValidationFailed("国家代码必须是2个字母".to_string()));
        }

        if self.ca_common_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("CA 通用名称不能为空".to_string()));
        }

        Ok(())
    }

    /// 从 TOML 文件读取并验证
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Persistence(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| ConfigError::Persistence(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Persistence(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| ConfigError::Persistence(format!("{}: {}", path.display(), e)))
    }
}

/// 配置构建器
#[derive(Debug, Clone, Default)]
pub struct KeystoreConfigBuilder {
    config: KeystoreConfig,
}

impl KeystoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca_common_name(mut self, name: impl Into<String>) -> Self {
        self.config.ca_common_name = name.into();
        self
    }

    pub fn with_organization_name(mut self, name: impl Into<String>) -> Self {
        self.config.organization_name = name.into();
        self
    }

    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.config.country_code = code.into();
        self
    }

    /// 设置身份证书有效期（天）
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.config.validity_days = days;
        self
    }

    pub fn with_ca_validity_days(mut self, days: u32) -> Self {
        self.config.ca_validity_days = days;
        self
    }

    /// 构建并验证配置
    pub fn build(self) -> Result<KeystoreConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
