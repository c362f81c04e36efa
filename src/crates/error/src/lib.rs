//! # 错误处理框架
//!
//! 密钥库工具链共享的错误描述层。各个子模块定义自己的领域错误枚举
//! （策略错误、密钥库错误等），再统一转换为 [`ErrorInfo`]，
//! 由命令行入口负责输出诊断信息和退出码。
//!
//! ## 使用示例
//!
//! ```rust
//! use error::{ErrorCategory, ErrorInfo, ErrorSeverity};
//!
//! let error = ErrorInfo::new(4001, "不支持的限定符: 'MAYBE'".to_string())
//!     .with_category(ErrorCategory::Policy)
//!     .with_severity(ErrorSeverity::Error)
//!     .with_context("编译策略文件 policy.xml".to_string());
//!
//! assert_eq!(error.code(), 4001);
//! ```

use std::fmt;

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 调试级别
    Debug = 0,
    /// 信息级别
    Info = 1,
    /// 警告级别：需要注意但不影响继续运行
    Warning = 2,
    /// 错误级别：当前操作失败
    Error = 3,
    /// 严重级别：密钥库状态可能已经不一致
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "调试"),
            ErrorSeverity::Info => write!(f, "信息"),
            ErrorSeverity::Warning => write!(f, "警告"),
            ErrorSeverity::Error => write!(f, "错误"),
            ErrorSeverity::Critical => write!(f, "严重"),
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// IO 错误
    Io,
    /// 文件系统错误（文件或目录不存在等）
    FileSystem,
    /// 文档解析错误
    Parse,
    /// 输入验证错误
    Validation,
    /// 访问控制策略错误
    Policy,
    /// 密钥库状态错误
    Keystore,
    /// 签名与加密错误
    Signing,
    /// 配置错误
    Configuration,
    /// 命令行用法错误
    Usage,
    /// 其他错误
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Io => write!(f, "IO错误"),
            ErrorCategory::FileSystem => write!(f, "文件系统错误"),
            ErrorCategory::Parse => write!(f, "解析错误"),
            ErrorCategory::Validation => write!(f, "验证错误"),
            ErrorCategory::Policy => write!(f, "策略错误"),
            ErrorCategory::Keystore => write!(f, "密钥库错误"),
            ErrorCategory::Signing => write!(f, "签名错误"),
            ErrorCategory::Configuration => write!(f, "配置错误"),
            ErrorCategory::Usage => write!(f, "用法错误"),
            ErrorCategory::Other => write!(f, "其他错误"),
        }
    }
}

/// 领域错误的统一接口
///
/// 每个领域错误枚举都实现此 trait，为每个变体提供稳定的错误码。
pub trait ErrorKind: fmt::Debug + fmt::Display + Send + Sync {
    /// 获取错误码
    fn error_code(&self) -> u32;

    /// 获取人类可读的错误描述
    fn error_message(&self) -> String {
        self.to_string()
    }

    /// 获取错误类别
    fn error_category(&self) -> ErrorCategory {
        ErrorCategory::Other
    }
}

/// 错误信息结构体
///
/// 封装错误码、消息、上下文、严重程度和类别。
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    code: u32,
    message: String,
    context: Vec<String>,
    severity: ErrorSeverity,
    category: ErrorCategory,
}

impl ErrorInfo {
    /// 创建一个新的错误信息
    pub fn new(code: u32, message: String) -> Self {
        Self {
            code,
            message,
            context: Vec::new(),
            severity: ErrorSeverity::Error,
            category: ErrorCategory::Other,
        }
    }

    /// 从领域错误创建错误信息，保留其错误码和类别
    pub fn from_kind<E: ErrorKind + ?Sized>(err: &E) -> Self {
        Self::new(err.error_code(), err.error_message()).with_category(err.error_category())
    }

    /// 添加错误上下文
    pub fn add_context(&mut self, context: String) {
        self.context.push(context);
    }

    /// 链式添加错误上下文
    pub fn with_context(mut self, context: String) -> Self {
        self.context.push(context);
        self
    }

    /// 设置错误严重程度
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// 设置错误类别
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 判断是否为严重错误
    pub fn is_critical(&self) -> bool {
        self.severity == ErrorSeverity::Critical
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}][错误码: {}] {}",
            self.severity, self.category, self.code, self.message
        )?;

        for ctx in &self.context {
            write!(f, "\n  上下文: {}", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorInfo {}

impl ErrorKind for ErrorInfo {
    fn error_code(&self) -> u32 {
        self.code
    }

    fn error_message(&self) -> String {
        self.message.clone()
    }

    fn error_category(&self) -> ErrorCategory {
        self.category
    }
}

/// 使用 `ErrorInfo` 作为错误类型的 Result 别名
pub type Result<T> = std::result::Result<T, ErrorInfo>;

impl From<std::io::Error> for ErrorInfo {
    fn from(err: std::io::Error) -> Self {
        let (code, category) = match err.kind() {
            std::io::ErrorKind::NotFound => (404, ErrorCategory::FileSystem),
            std::io::ErrorKind::PermissionDenied => (403, ErrorCategory::FileSystem),
            std::io::ErrorKind::AlreadyExists => (409, ErrorCategory::FileSystem),
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                (400, ErrorCategory::Validation)
            }
            _ => (500, ErrorCategory::Io),
        };

        ErrorInfo::new(code, err.to_string())
            .with_category(category)
            .with_severity(ErrorSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BadQualifier(String);

    impl fmt::Display for BadQualifier {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "不支持的限定符: {:?}", self.0)
        }
    }

    impl ErrorKind for BadQualifier {
        fn error_code(&self) -> u32 {
            4001
        }

        fn error_category(&self) -> ErrorCategory {
            ErrorCategory::Policy
        }
    }

    #[test]
    fn test_error_info_new() {
        let error = ErrorInfo::new(404, "未找到策略文件".to_string());
        assert_eq!(error.code(), 404);
        assert_eq!(error.message(), "未找到策略文件");
        assert_eq!(error.category(), ErrorCategory::Other);
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_from_kind_keeps_code_and_category() {
        let error = ErrorInfo::from_kind(&BadQualifier("MAYBE".to_string()));
        assert_eq!(error.code(), 4001);
        assert_eq!(error.category(), ErrorCategory::Policy);
        assert!(error.message().contains("MAYBE"));
    }

    #[test]
    fn test_error_context_display() {
        let error = ErrorInfo::new(5002, "签名失败".to_string())
            .with_context("密钥库: /tmp/keystore".to_string())
            .with_context("身份: /talker".to_string());

        assert_eq!(error.context().len(), 2);
        let display = format!("{}", error);
        assert!(display.contains("5002"));
        assert!(display.contains("上下文: 密钥库: /tmp/keystore"));
        assert!(display.contains("上下文: 身份: /talker"));
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert!(ErrorSeverity::Error > ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning > ErrorSeverity::Info);
        assert!(ErrorSeverity::Info > ErrorSeverity::Debug);
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Policy), "策略错误");
        assert_eq!(format!("{}", ErrorCategory::Keystore), "密钥库错误");
        assert_eq!(format!("{}", ErrorCategory::Usage), "用法错误");
    }

    #[test]
    fn test_io_not_found_maps_to_filesystem() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "policy.xml");
        let error: ErrorInfo = io.into();
        assert_eq!(error.code(), 404);
        assert_eq!(error.category(), ErrorCategory::FileSystem);
    }
}
