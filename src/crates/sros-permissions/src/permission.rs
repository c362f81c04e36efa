//! # 权限模型
//!
//! 单条访问控制规则的类型化表示：资源类型、授予/拒绝的能力，以及规则
//! 作用的名称表达式。每种资源类型只接受固定的能力集合：
//!
//! | 资源类型 | 允许的能力 |
//! |---|---|
//! | `topics` | subscribe, publish |
//! | `services` | request, reply |
//! | `actions` | call, execute |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::capability::{Capability, CapabilityType, Qualifier};
use crate::error::PolicyError;
use crate::expression::Expression;

/// 权限（资源）类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionType {
    Topic,
    Service,
    Action,
}

impl PermissionType {
    pub const ALL: [PermissionType; 3] =
        [PermissionType::Topic, PermissionType::Service, PermissionType::Action];

    /// 权限元素的标签名
    pub fn tag(&self) -> &'static str {
        match self {
            PermissionType::Topic => "topics",
            PermissionType::Service => "services",
            PermissionType::Action => "actions",
        }
    }

    /// 表达式元素的标签名
    pub fn expression_tag(&self) -> &'static str {
        match self {
            PermissionType::Topic => "topic",
            PermissionType::Service => "service",
            PermissionType::Action => "action",
        }
    }

    /// 该权限类型允许的能力集合
    pub fn allowed_capabilities(&self) -> &'static [CapabilityType] {
        match self {
            PermissionType::Topic => &[CapabilityType::Subscribe, CapabilityType::Publish],
            PermissionType::Service => &[CapabilityType::Request, CapabilityType::Reply],
            PermissionType::Action => &[CapabilityType::Call, CapabilityType::Execute],
        }
    }

    pub fn supports(&self, capability_type: CapabilityType) -> bool {
        self.allowed_capabilities().contains(&capability_type)
    }
}

impl FromStr for PermissionType {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag() == s)
            .ok_or_else(|| PolicyError::UnsupportedPermissionType { type_string: s.to_string() })
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 单条权限规则
///
/// 能力按首次出现的顺序保存，同一能力类型最多出现一次；
/// 表达式保持文档顺序。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    permission_type: PermissionType,
    capabilities: Vec<Capability>,
    expressions: Vec<Expression>,
}

impl Permission {
    pub fn new(permission_type: PermissionType) -> Self {
        Self { permission_type, capabilities: Vec::new(), expressions: Vec::new() }
    }

    /// 附加能力
    ///
    /// 能力类型不属于该权限类型时返回 [`PolicyError::UnsupportedCapabilityType`]。
    /// 重复附加同一能力类型时覆盖原有限定符。
    pub fn add_capability(&mut self, capability: Capability) -> Result<(), PolicyError> {
        if !self.permission_type.supports(capability.capability_type) {
            return Err(PolicyError::UnsupportedCapabilityType {
                permission_type: self.permission_type,
                capability_type: capability.capability_type,
            });
        }

        match self
            .capabilities
            .iter_mut()
            .find(|existing| existing.capability_type == capability.capability_type)
        {
            Some(existing) => existing.qualifier = capability.qualifier,
            None => self.capabilities.push(capability),
        }
        Ok(())
    }

    /// 链式附加能力
    pub fn with_capability(mut self, capability: Capability) -> Result<Self, PolicyError> {
        self.add_capability(capability)?;
        Ok(self)
    }

    pub fn add_expression(&mut self, expression: Expression) {
        self.expressions.push(expression);
    }

    pub fn with_expression(mut self, expression: Expression) -> Self {
        self.add_expression(expression);
        self
    }

    pub fn permission_type(&self) -> PermissionType {
        self.permission_type
    }

    /// 查询某个能力的限定符
    pub fn qualifier(&self, capability_type: CapabilityType) -> Option<Qualifier> {
        self.capabilities
            .iter()
            .find(|c| c.capability_type == capability_type)
            .map(|c| c.qualifier)
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_membership_matrix() {
        for permission_type in PermissionType::ALL {
            for capability_type in CapabilityType::ALL {
                let mut permission = Permission::new(permission_type);
                let result = permission.add_capability(Capability::allow(capability_type));

                if permission_type.allowed_capabilities().contains(&capability_type) {
                    assert!(result.is_ok(), "{} 应该接受 {}", permission_type, capability_type);
                } else {
                    assert_eq!(
                        result,
                        Err(PolicyError::UnsupportedCapabilityType { permission_type, capability_type })
                    );
                    assert!(permission.capabilities().is_empty(), "失败的附加不应修改权限");
                }
            }
        }
    }

    #[test]
    fn test_reattach_overwrites_qualifier() {
        let mut permission = Permission::new(PermissionType::Topic);
        permission.add_capability(Capability::allow(CapabilityType::Subscribe)).unwrap();
        permission.add_capability(Capability::allow(CapabilityType::Publish)).unwrap();
        permission.add_capability(Capability::deny(CapabilityType::Subscribe)).unwrap();

        assert_eq!(permission.capabilities().len(), 2);
        assert_eq!(permission.qualifier(CapabilityType::Subscribe), Some(Qualifier::Deny));
        assert_eq!(permission.capabilities()[0].capability_type, CapabilityType::Subscribe);
    }

    #[test]
    fn test_permission_type_from_tag() {
        assert_eq!("topics".parse::<PermissionType>(), Ok(PermissionType::Topic));
        assert_eq!("services".parse::<PermissionType>(), Ok(PermissionType::Service));
        assert_eq!("actions".parse::<PermissionType>(), Ok(PermissionType::Action));
        assert_eq!(
            "parameters".parse::<PermissionType>(),
            Err(PolicyError::UnsupportedPermissionType { type_string: "parameters".to_string() })
        );
    }
}
