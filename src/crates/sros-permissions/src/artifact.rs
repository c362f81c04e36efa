//! # 权限文件
//!
//! 单个身份编译后的权限集合，以及它与 `permissions.xml` 之间的
//! 无状态映射。权限对象本身不持有文档节点，序列化是独立的一步。

use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilityType};
use crate::document::Element;
use crate::error::PolicyError;
use crate::expression::Expression;
use crate::permission::{Permission, PermissionType};

/// 权限文件中的时间格式
pub const VALIDITY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ROOT_TAG: &str = "permissions";
const GRANT_TAG: &str = "grant";
const SUBJECT_TAG: &str = "subject_name";
const VALIDITY_TAG: &str = "validity";
const NOT_BEFORE_TAG: &str = "not_before";
const NOT_AFTER_TAG: &str = "not_after";
const DEFAULT_TAG: &str = "default";

/// 授权有效期（UTC，精确到秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: NaiveDateTime,
    pub not_after: NaiveDateTime,
}

impl Validity {
    /// 从当前时间开始的有效期
    pub fn from_now(days: u32) -> Self {
        let now = Utc::now().naive_utc();
        let not_before = now.with_nanosecond(0).unwrap_or(now);
        Self { not_before, not_after: not_before + Duration::days(i64::from(days)) }
    }
}

/// 单个身份的权限文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionArtifact {
    identity: String,
    validity: Validity,
    permissions: Vec<Permission>,
}

impl PermissionArtifact {
    pub fn new(identity: impl Into<String>, validity: Validity) -> Self {
        Self { identity: identity.into(), validity, permissions: Vec::new() }
    }

    /// 不含任何规则的权限文件，只剩默认的 DENY
    pub fn deny_all(identity: impl Into<String>, validity: Validity) -> Self {
        Self::new(identity, validity)
    }

    pub fn push_permission(&mut self, permission: Permission) {
        self.permissions.push(permission);
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn subject_name(&self) -> String {
        format!("CN={}", self.identity)
    }

    pub fn to_element(&self) -> Element {
        let validity = Element::new(VALIDITY_TAG)
            .with_child(
                Element::new(NOT_BEFORE_TAG)
                    .with_text(self.validity.not_before.format(VALIDITY_FORMAT).to_string()),
            )
            .with_child(
                Element::new(NOT_AFTER_TAG)
                    .with_text(self.validity.not_after.format(VALIDITY_FORMAT).to_string()),
            );

        let mut grant = Element::new(GRANT_TAG)
            .with_attribute("name", self.identity.as_str())
            .with_child(Element::new(SUBJECT_TAG).with_text(self.subject_name()))
            .with_child(validity);
        for permission in &self.permissions {
            grant.push_element(permission_to_element(permission));
        }
        grant.push_element(Element::new(DEFAULT_TAG).with_text("DENY"));

        Element::new(ROOT_TAG).with_child(grant)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, PolicyError> {
        self.to_element().to_bytes()
    }

    /// 解析 `permissions.xml`，与编译时使用相同的类型校验
    pub fn from_xml(bytes: &[u8]) -> Result<Self, PolicyError> {
        let root = Element::parse(bytes)?;
        if root.name != ROOT_TAG {
            return Err(PolicyError::MalformedDocument(format!(
                "权限文件根元素应为 <{}>，实际为 <{}>",
                ROOT_TAG, root.name
            )));
        }
        let grant = root
            .child(GRANT_TAG)
            .ok_or_else(|| PolicyError::MalformedDocument("权限文件缺少 <grant>".to_string()))?;
        let identity = grant
            .attribute("name")
            .ok_or_else(|| PolicyError::MalformedDocument("<grant> 缺少 name 属性".to_string()))?;

        let validity = grant
            .child(VALIDITY_TAG)
            .ok_or_else(|| PolicyError::MalformedDocument("<grant> 缺少 <validity>".to_string()))?;
        let validity = Validity {
            not_before: read_time(validity, NOT_BEFORE_TAG)?,
            not_after: read_time(validity, NOT_AFTER_TAG)?,
        };

        let mut artifact = Self::new(identity, validity);
        for element in grant.elements() {
            match element.name.as_str() {
                SUBJECT_TAG | VALIDITY_TAG | DEFAULT_TAG => {}
                _ => artifact.push_permission(permission_from_element(element, Expression::absolute)?),
            }
        }
        Ok(artifact)
    }
}

fn read_time(validity: &Element, tag: &str) -> Result<NaiveDateTime, PolicyError> {
    let text = validity
        .child(tag)
        .map(Element::text)
        .ok_or_else(|| PolicyError::MalformedDocument(format!("<validity> 缺少 <{}>", tag)))?;
    NaiveDateTime::parse_from_str(&text, VALIDITY_FORMAT)
        .map_err(|e| PolicyError::MalformedDocument(format!("无效的时间 {:?}: {}", text, e)))
}

/// 权限到文档元素的映射
pub fn permission_to_element(permission: &Permission) -> Element {
    let permission_type = permission.permission_type();
    let mut element = Element::new(permission_type.tag());
    for capability in permission.capabilities() {
        element.set_attribute(capability.capability_type.as_str(), capability.qualifier.as_str());
    }
    for expression in permission.expressions() {
        element.push_element(
            Element::new(permission_type.expression_tag()).with_text(expression.as_str()),
        );
    }
    element
}

/// 文档元素到权限的映射
///
/// 属性按文档顺序校验：先确认是能力名，再解析限定符，最后检查能力是否
/// 属于该权限类型。表达式的解析方式由调用方决定。
pub fn permission_from_element<F>(element: &Element, resolve: F) -> Result<Permission, PolicyError>
where
    F: Fn(&str) -> Result<Expression, PolicyError>,
{
    let permission_type: PermissionType = element.name.parse()?;
    let mut permission = Permission::new(permission_type);

    for (key, value) in &element.attributes {
        let capability_type = CapabilityType::from_attribute(key).ok_or_else(|| {
            PolicyError::UnsupportedPolicy(format!("<{}> 含有未知属性 {:?}", element.name, key))
        })?;
        permission.add_capability(Capability::parse(capability_type, value)?)?;
    }
    if permission.capabilities().is_empty() {
        return Err(PolicyError::UnsupportedPolicy(format!(
            "<{}> 没有声明任何能力",
            element.name
        )));
    }

    for child in element.elements() {
        if child.name != permission_type.expression_tag() {
            return Err(PolicyError::UnsupportedPolicy(format!(
                "<{}> 中只能出现 <{}>，实际为 <{}>",
                element.name,
                permission_type.expression_tag(),
                child.name
            )));
        }
        permission.add_expression(resolve(&child.text())?);
    }
    if permission.expressions().is_empty() {
        return Err(PolicyError::UnsupportedPolicy(format!(
            "<{}> 没有任何表达式",
            element.name
        )));
    }

    Ok(permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Qualifier;

    fn sample() -> PermissionArtifact {
        let mut artifact = PermissionArtifact::new("/n1", Validity::from_now(10));
        artifact.push_permission(
            Permission::new(PermissionType::Topic)
                .with_capability(Capability::allow(CapabilityType::Subscribe))
                .and_then(|p| p.with_capability(Capability::deny(CapabilityType::Publish)))
                .expect("能力应该有效")
                .with_expression(Expression::absolute("/chatter").unwrap())
                .with_expression(Expression::absolute("/rosout").unwrap()),
        );
        artifact.push_permission(
            Permission::new(PermissionType::Action)
                .with_capability(Capability::allow(CapabilityType::Call))
                .expect("能力应该有效")
                .with_expression(Expression::absolute("/fibonacci").unwrap()),
        );
        artifact
    }

    #[test]
    fn test_artifact_round_trip_keeps_order() {
        let artifact = sample();
        let bytes = artifact.to_xml().expect("序列化失败");
        let parsed = PermissionArtifact::from_xml(&bytes).expect("解析失败");

        assert_eq!(parsed, artifact);
        assert_eq!(parsed.to_xml().expect("再次序列化失败"), bytes);

        let topics = &parsed.permissions()[0];
        assert_eq!(topics.qualifier(CapabilityType::Subscribe), Some(Qualifier::Allow));
        assert_eq!(topics.qualifier(CapabilityType::Publish), Some(Qualifier::Deny));
        let names: Vec<_> = topics.expressions().iter().map(Expression::as_str).collect();
        assert_eq!(names, vec!["/chatter", "/rosout"]);
    }

    #[test]
    fn test_artifact_serde_uses_validity_timestamps() {
        let artifact = sample();
        let value = serde_json::to_value(&artifact).expect("JSON 序列化失败");
        assert_eq!(
            value["validity"]["not_before"],
            serde_json::Value::String(
                artifact.validity().not_before.format("%Y-%m-%dT%H:%M:%S").to_string()
            )
        );

        let back: PermissionArtifact = serde_json::from_value(value).expect("JSON 反序列化失败");
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_deny_all_layout() {
        let artifact = PermissionArtifact::deny_all("/n1", Validity::from_now(1));
        let root = artifact.to_element();
        let grant = root.child("grant").expect("缺少 grant");

        assert_eq!(grant.attribute("name"), Some("/n1"));
        assert_eq!(grant.child("subject_name").map(Element::text), Some("CN=/n1".to_string()));
        assert_eq!(grant.child("default").map(Element::text), Some("DENY".to_string()));
        assert_eq!(grant.elements().count(), 3);
    }

    #[test]
    fn test_validity_is_whole_seconds() {
        let validity = Validity::from_now(30);
        assert_eq!(validity.not_before.nanosecond(), 0);
        assert_eq!(validity.not_after - validity.not_before, Duration::days(30));
    }

    #[test]
    fn test_permission_element_validation() {
        let resolve = Expression::absolute;

        let element = Element::new("actions")
            .with_attribute("call", "MAYBE")
            .with_child(Element::new("action").with_text("/fib"));
        assert_eq!(
            permission_from_element(&element, resolve),
            Err(PolicyError::UnsupportedQualifier { qualifier: "MAYBE".to_string() })
        );

        let element = Element::new("topics")
            .with_attribute("call", "ALLOW")
            .with_child(Element::new("topic").with_text("/chatter"));
        assert_eq!(
            permission_from_element(&element, resolve),
            Err(PolicyError::UnsupportedCapabilityType {
                permission_type: PermissionType::Topic,
                capability_type: CapabilityType::Call,
            })
        );

        let element = Element::new("topics").with_child(Element::new("topic").with_text("/chatter"));
        assert!(matches!(
            permission_from_element(&element, resolve),
            Err(PolicyError::UnsupportedPolicy(_))
        ));

        let element = Element::new("topics")
            .with_attribute("subscribe", "ALLOW")
            .with_child(Element::new("service").with_text("/chatter"));
        assert!(matches!(
            permission_from_element(&element, resolve),
            Err(PolicyError::UnsupportedPolicy(_))
        ));

        let element = Element::new("parameters").with_attribute("read", "ALLOW");
        assert_eq!(
            permission_from_element(&element, resolve),
            Err(PolicyError::UnsupportedPermissionType { type_string: "parameters".to_string() })
        );
    }
}
