//! # 策略错误定义
//!
//! 策略编译过程中的所有验证错误。每个变体都携带导致失败的原始值，
//! 便于调用方按类型区分并向操作员报告。

use error::{ErrorCategory, ErrorInfo, ErrorKind, ErrorSeverity};
use std::fmt;

use crate::capability::CapabilityType;
use crate::permission::PermissionType;

/// 策略错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 限定符不是 ALLOW / DENY
    UnsupportedQualifier {
        /// 原始限定符字符串
        qualifier: String,
    },

    /// 无法识别的资源类型
    UnsupportedPermissionType {
        /// 原始类型字符串
        type_string: String,
    },

    /// 能力类型不属于该权限类型允许的集合
    UnsupportedCapabilityType {
        permission_type: PermissionType,
        capability_type: CapabilityType,
    },

    /// 文档结构合法但本工具不支持（例如规则属性含糊）
    UnsupportedPolicy(String),

    /// 文档无法解析
    MalformedDocument(String),

    /// 策略文件不存在
    NotFound(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::UnsupportedQualifier { qualifier } => {
                write!(f, "不支持的限定符: {:?}", qualifier)
            }
            PolicyError::UnsupportedPermissionType { type_string } => {
                write!(f, "不支持的权限类型: {:?}", type_string)
            }
            PolicyError::UnsupportedCapabilityType { permission_type, capability_type } => write!(
                f,
                "权限类型 {:?} 不支持能力类型 {:?}",
                permission_type.tag(),
                capability_type.as_str()
            ),
            PolicyError::UnsupportedPolicy(why) => write!(f, "不支持的策略: {}", why),
            PolicyError::MalformedDocument(why) => write!(f, "策略文档格式错误: {}", why),
            PolicyError::NotFound(path) => write!(f, "文件不存在: {}", path),
        }
    }
}

impl std::error::Error for PolicyError {}

impl ErrorKind for PolicyError {
    fn error_code(&self) -> u32 {
        match self {
            PolicyError::UnsupportedQualifier { .. } => 4001,
            PolicyError::UnsupportedPermissionType { .. } => 4002,
            PolicyError::UnsupportedCapabilityType { .. } => 4003,
            PolicyError::UnsupportedPolicy(_) => 4004,
            PolicyError::MalformedDocument(_) => 4005,
            PolicyError::NotFound(_) => 404,
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            PolicyError::MalformedDocument(_) => ErrorCategory::Parse,
            PolicyError::NotFound(_) => ErrorCategory::FileSystem,
            _ => ErrorCategory::Policy,
        }
    }
}

impl From<PolicyError> for ErrorInfo {
    fn from(err: PolicyError) -> Self {
        ErrorInfo::from_kind(&err).with_severity(ErrorSeverity::Error)
    }
}

impl From<quick_xml::Error> for PolicyError {
    fn from(err: quick_xml::Error) -> Self {
        PolicyError::MalformedDocument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_offending_value() {
        let err = PolicyError::UnsupportedQualifier { qualifier: "MAYBE".to_string() };
        assert!(err.to_string().contains("MAYBE"));

        let err = PolicyError::UnsupportedCapabilityType {
            permission_type: PermissionType::Action,
            capability_type: CapabilityType::Subscribe,
        };
        let message = err.to_string();
        assert!(message.contains("actions"));
        assert!(message.contains("subscribe"));
    }

    #[test]
    fn test_conversion_into_error_info() {
        let info: ErrorInfo = PolicyError::UnsupportedPermissionType {
            type_string: "parameters".to_string(),
        }
        .into();
        assert_eq!(info.code(), 4002);
        assert_eq!(info.category(), ErrorCategory::Policy);

        let info: ErrorInfo = PolicyError::NotFound("/tmp/none.xml".to_string()).into();
        assert_eq!(info.code(), 404);
        assert_eq!(info.category(), ErrorCategory::FileSystem);
    }
}
