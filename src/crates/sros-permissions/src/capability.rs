//! # 能力与限定符
//!
//! 能力（capability）是权限规则允许或拒绝的具体动作，例如订阅话题、
//! 调用动作。能力本身没有独立生命周期，只在所属的权限中有意义。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// 能力类型
///
/// 枚举值与策略文档中的属性名一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityType {
    Subscribe,
    Publish,
    Request,
    Reply,
    Call,
    Execute,
}

impl CapabilityType {
    /// 所有能力类型
    pub const ALL: [CapabilityType; 6] = [
        CapabilityType::Subscribe,
        CapabilityType::Publish,
        CapabilityType::Request,
        CapabilityType::Reply,
        CapabilityType::Call,
        CapabilityType::Execute,
    ];

    /// 文档中使用的属性名
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityType::Subscribe => "subscribe",
            CapabilityType::Publish => "publish",
            CapabilityType::Request => "request",
            CapabilityType::Reply => "reply",
            CapabilityType::Call => "call",
            CapabilityType::Execute => "execute",
        }
    }

    /// 按属性名查找能力类型
    pub fn from_attribute(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 能力限定符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    Allow,
    Deny,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::Allow => "ALLOW",
            Qualifier::Deny => "DENY",
        }
    }
}

impl FromStr for Qualifier {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(Qualifier::Allow),
            "DENY" => Ok(Qualifier::Deny),
            other => Err(PolicyError::UnsupportedQualifier { qualifier: other.to_string() }),
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 能力：能力类型与限定符的组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub capability_type: CapabilityType,
    pub qualifier: Qualifier,
}

impl Capability {
    pub fn new(capability_type: CapabilityType, qualifier: Qualifier) -> Self {
        Self { capability_type, qualifier }
    }

    /// 从文档中的限定符字符串构造能力
    ///
    /// 限定符必须严格等于 `ALLOW` 或 `DENY`，否则返回
    /// [`PolicyError::UnsupportedQualifier`]。
    pub fn parse(capability_type: CapabilityType, qualifier: &str) -> Result<Self, PolicyError> {
        Ok(Self::new(capability_type, qualifier.parse()?))
    }

    pub fn allow(capability_type: CapabilityType) -> Self {
        Self::new(capability_type, Qualifier::Allow)
    }

    pub fn deny(capability_type: CapabilityType) -> Self {
        Self::new(capability_type, Qualifier::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualifier_accepts_only_allow_and_deny() {
        assert_eq!("ALLOW".parse::<Qualifier>(), Ok(Qualifier::Allow));
        assert_eq!("DENY".parse::<Qualifier>(), Ok(Qualifier::Deny));

        for bad in ["allow", "Deny", "MAYBE", "", " ALLOW"] {
            assert_eq!(
                bad.parse::<Qualifier>(),
                Err(PolicyError::UnsupportedQualifier { qualifier: bad.to_string() }),
                "限定符 {:?} 应该被拒绝",
                bad
            );
        }
    }

    #[test]
    fn test_capability_parse() {
        let capability = Capability::parse(CapabilityType::Call, "DENY").expect("DENY 应该有效");
        assert_eq!(capability, Capability::deny(CapabilityType::Call));

        let err = Capability::parse(CapabilityType::Call, "MAYBE").unwrap_err();
        assert_eq!(err, PolicyError::UnsupportedQualifier { qualifier: "MAYBE".to_string() });
    }

    #[test]
    fn test_capability_attribute_names() {
        for capability_type in CapabilityType::ALL {
            assert_eq!(CapabilityType::from_attribute(capability_type.as_str()), Some(capability_type));
        }
        assert_eq!(CapabilityType::from_attribute("SUBSCRIBE"), None);
        assert_eq!(CapabilityType::from_attribute("read"), None);
    }
}
