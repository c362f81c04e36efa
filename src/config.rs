//! # 工具配置
//!
//! `sros.toml` 的内容：`[keystore]` 对应新建密钥库时使用的 CA 参数，
//! `[logging]` 控制工具自身的日志级别。
//!
//! ```toml
//! [keystore]
//! ca_common_name = "Fleet CA"
//! validity_days = 365
//!
//! [logging]
//! level = "debug"
//! ```

use error::{ErrorCategory, ErrorInfo, ErrorSeverity};
use serde::{Deserialize, Serialize};
use sros_identity::KeystoreConfig;
use std::path::Path;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "SROS_CONFIG";

/// 工作目录下的默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "sros.toml";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace / debug / info / warn / error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<tracing::Level, ErrorInfo> {
        self.level.parse().map_err(|_| {
            config_error(format!("无效的日志级别: {:?}", self.level))
        })
    }
}

/// 工具配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrosConfig {
    pub keystore: KeystoreConfig,
    pub logging: LoggingConfig,
}

impl SrosConfig {
    /// 校验各个配置段
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        self.keystore.validate().map_err(|e| config_error(e.to_string()))?;
        self.logging.max_level()?;
        Ok(())
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ErrorInfo> {
        let config: Self = toml::from_str(text).map_err(|e| config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config")]
    pub fn load(path: &Path) -> Result<Self, ErrorInfo> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("读取配置文件 {} 失败: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
            .map(|config| {
                tracing::debug!("从配置文件加载: {}", path.display());
                config
            })
            .map_err(|e| e.with_context(format!("配置文件: {}", path.display())))
    }

    /// 查找并加载配置
    ///
    /// 依次尝试 `SROS_CONFIG` 指定的文件（必须存在）、工作目录下的
    /// `sros.toml`，都没有时使用默认配置。
    pub fn discover() -> Result<Self, ErrorInfo> {
        #[cfg(feature = "config")]
        {
            if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
                return Self::load(Path::new(&path));
            }
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.is_file() {
                return Self::load(local);
            }
        }

        Ok(Self::default())
    }
}

fn config_error(message: String) -> ErrorInfo {
    ErrorInfo::new(3001, message)
        .with_category(ErrorCategory::Configuration)
        .with_severity(ErrorSeverity::Error)
}
