//! # 安全日志配置
//!
//! 为身份生成 `logging.xml`。QoS 部分只以注释形式给出示例，供操作员
//! 手动修改，运行时不会读取这些注释。
//!
//! 至少需要日志文件或 distribute 之一，这一约束由调用方（命令行）保证。

use sros_permissions::Element;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::KeystoreError;
use crate::keystore::Keystore;

pub const LOGGING_FILE: &str = "logging.xml";
pub const LOGGING_VERSION: &str = "1";

/// 日志级别，从最严重到最不严重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verbosity {
    Emergency,
    Alert,
    Critical,
    #[default]
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

impl Verbosity {
    pub const ALL: [Verbosity; 8] = [
        Verbosity::Emergency,
        Verbosity::Alert,
        Verbosity::Critical,
        Verbosity::Error,
        Verbosity::Warning,
        Verbosity::Notice,
        Verbosity::Informational,
        Verbosity::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Emergency => "EMERGENCY",
            Verbosity::Alert => "ALERT",
            Verbosity::Critical => "CRITICAL",
            Verbosity::Error => "ERROR",
            Verbosity::Warning => "WARNING",
            Verbosity::Notice => "NOTICE",
            Verbosity::Informational => "INFORMATIONAL",
            Verbosity::Debug => "DEBUG",
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("未知的日志级别: {}", s))
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志配置参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingOptions {
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
    pub distribute: bool,
}

/// 生成日志配置文档
pub fn security_log_document(options: &LoggingOptions) -> Element {
    let mut root = Element::new("security_log").with_attribute("version", LOGGING_VERSION);

    // 空路径等同于未设置
    match options.log_file.as_deref().filter(|path| !path.is_empty()) {
        Some(path) => root.push_element(Element::new("file").with_text(path)),
        None => {
            root.push_comment(" Uncomment the following to log to file ");
            root.push_comment(" <file>/path/to/file.log</file> ");
        }
    }

    root.push_element(Element::new("verbosity").with_text(options.verbosity.as_str()));
    root.push_element(
        Element::new("distribute").with_text(if options.distribute { "true" } else { "false" }),
    );

    root.push_comment(" The following applies when logging over DDS (i.e. distribute = true) ");
    let mut qos = Element::new("qos");
    for (tag, value) in [
        ("profile", "DEFAULT"),
        ("reliability", "RELIABLE"),
        ("history", "KEEP_LAST"),
        ("durability", "VOLATILE"),
        ("liveliness", "AUTOMATIC"),
        ("depth", "10"),
        ("deadline", "10.5"),
        ("lifespan", "12.2"),
        ("liveliness_lease_duration", "30.4"),
    ] {
        qos.push_comment(format!(" <{tag}>{value}</{tag}> "));
    }
    root.push_element(qos);

    root
}

/// 为一个身份或全部身份写入 `logging.xml`，返回写入的文件
pub fn enable_logging(
    root: &Path,
    identity: Option<&str>,
    options: &LoggingOptions,
) -> Result<Vec<PathBuf>, KeystoreError> {
    let keystore = Keystore::open(root)?;

    let identities: Vec<String> = match identity {
        Some(identity) => {
            if !keystore.contains_identity(identity) {
                return Err(KeystoreError::NotFound(format!("身份 {}", identity)));
            }
            vec![identity.to_string()]
        }
        None => keystore.enumerate_identities().collect(),
    };

    let bytes = security_log_document(options)
        .to_bytes()
        .map_err(|e| KeystoreError::Io(e.to_string()))?;

    let mut written = Vec::with_capacity(identities.len());
    for identity in &identities {
        let path = keystore
            .identity_dir(identity)
            .map_err(KeystoreError::NotFound)?
            .join(LOGGING_FILE);
        std::fs::write(&path, &bytes)?;
        written.push(path);
    }

    info!(
        "已为 {} 个身份写入日志配置，级别 {}",
        written.len(),
        options.verbosity
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_order_and_names() {
        assert!(Verbosity::Emergency < Verbosity::Debug);
        assert_eq!(Verbosity::default(), Verbosity::Error);
        assert_eq!("informational".parse::<Verbosity>(), Ok(Verbosity::Informational));
        assert!("LOUD".parse::<Verbosity>().is_err());
    }

    #[test]
    fn test_document_without_file() {
        let options = LoggingOptions { distribute: true, ..Default::default() };
        let document = security_log_document(&options);

        assert_eq!(document.attribute("version"), Some("1"));
        let names: Vec<&str> = document.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["verbosity", "distribute", "qos"]);
        assert_eq!(document.child("distribute").map(Element::text), Some("true".to_string()));
        assert_eq!(document.child("verbosity").map(Element::text), Some("ERROR".to_string()));
        assert!(document.comments().any(|c| c.contains("<file>/path/to/file.log</file>")));

        let qos = document.child("qos").expect("缺少 qos");
        assert_eq!(qos.elements().count(), 0);
        assert_eq!(qos.comments().count(), 9);
    }

    #[test]
    fn test_empty_log_file_is_unset() {
        let options = LoggingOptions {
            log_file: Some(String::new()),
            distribute: true,
            ..Default::default()
        };
        let document = security_log_document(&options);
        assert!(document.child("file").is_none());
        assert!(document.comments().any(|c| c.contains("<file>/path/to/file.log</file>")));
    }

    #[test]
    fn test_document_with_file() {
        let options = LoggingOptions {
            verbosity: Verbosity::Debug,
            log_file: Some("/foo/bar".to_string()),
            distribute: false,
        };
        let document = security_log_document(&options);

        let names: Vec<&str> = document.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["file", "verbosity", "distribute", "qos"]);
        assert_eq!(document.child("file").map(Element::text), Some("/foo/bar".to_string()));
        assert_eq!(document.child("distribute").map(Element::text), Some("false".to_string()));
    }
}
