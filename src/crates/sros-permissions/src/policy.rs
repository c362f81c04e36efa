//! # 策略文档
//!
//! 声明式访问控制策略的内存表示。加载阶段只检查文档骨架
//! （contexts / context / profile），权限元素原样保留，由
//! [`PolicyCompiler`](crate::compiler::PolicyCompiler) 负责类型校验。
//! 文档加载后只读，编译器不会修改它。

use std::path::Path;
use tracing::debug;

use crate::document::Element;
use crate::error::PolicyError;
use crate::expression::ProfileScope;

/// 检查身份路径：必须以 `/` 开头，且不含空段、`.` 或 `..`
///
/// 返回失败原因，由调用方包装为各自的错误类型。
pub fn check_identity_path(path: &str) -> Result<(), String> {
    let Some(relative) = path.strip_prefix('/') else {
        return Err(format!("身份路径必须以 '/' 开头: {:?}", path));
    };
    if relative.is_empty() {
        return Err("身份路径不能为空".to_string());
    }
    if path.chars().any(char::is_control) {
        return Err(format!("身份路径不能包含控制字符: {:?}", path));
    }
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(format!("身份路径包含非法段 {:?}: {:?}", segment, path));
        }
    }
    Ok(())
}

/// profile：同一作用域下的一组权限元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyProfile {
    pub scope: ProfileScope,
    pub permissions: Vec<Element>,
}

/// context：一个身份及其 profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyContext {
    pub identity: String,
    pub profiles: Vec<PolicyProfile>,
}

/// 已加载的策略文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    contexts: Vec<PolicyContext>,
}

impl PolicyDocument {
    /// 从文件加载策略
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PolicyError::NotFound(path.display().to_string()),
            _ => PolicyError::MalformedDocument(format!("无法读取 {}: {}", path.display(), e)),
        })?;

        let document = Self::from_bytes(&bytes)?;
        debug!("已加载策略文件 {}，共 {} 个 context", path.display(), document.contexts.len());
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PolicyError> {
        Self::from_element(&Element::parse(bytes)?)
    }

    /// 根元素可以是 `policy`（包含 `contexts`），也可以直接是 `contexts`
    pub fn from_element(root: &Element) -> Result<Self, PolicyError> {
        let contexts = match root.name.as_str() {
            "contexts" => root,
            "policy" => root.child("contexts").ok_or_else(|| {
                PolicyError::UnsupportedPolicy("<policy> 缺少 <contexts> 元素".to_string())
            })?,
            other => {
                return Err(PolicyError::UnsupportedPolicy(format!(
                    "根元素必须是 <policy> 或 <contexts>，实际为 <{}>",
                    other
                )))
            }
        };

        let contexts = contexts
            .elements()
            .map(|element| match element.name.as_str() {
                "context" => read_context(element),
                other => Err(PolicyError::UnsupportedPolicy(format!(
                    "<contexts> 下出现未知元素 <{}>",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { contexts })
    }

    pub fn contexts(&self) -> &[PolicyContext] {
        &self.contexts
    }
}

fn read_context(element: &Element) -> Result<PolicyContext, PolicyError> {
    let identity = element
        .attribute("path")
        .ok_or_else(|| PolicyError::UnsupportedPolicy("<context> 缺少 path 属性".to_string()))?
        .trim()
        .to_string();
    check_identity_path(&identity).map_err(PolicyError::UnsupportedPolicy)?;

    let mut profiles = Vec::new();
    for child in element.elements() {
        match child.name.as_str() {
            "profile" => profiles.push(read_profile(child, &identity)?),
            "profiles" => {
                for profile in child.elements() {
                    if profile.name != "profile" {
                        return Err(PolicyError::UnsupportedPolicy(format!(
                            "<profiles> 下出现未知元素 <{}>",
                            profile.name
                        )));
                    }
                    profiles.push(read_profile(profile, &identity)?);
                }
            }
            other => {
                return Err(PolicyError::UnsupportedPolicy(format!(
                    "context {} 下出现未知元素 <{}>",
                    identity, other
                )))
            }
        }
    }

    Ok(PolicyContext { identity, profiles })
}

/// 缺省的 ns / node 由身份路径推出：`/robot/talker` 对应 ns `/robot`、node `talker`
fn read_profile(element: &Element, identity: &str) -> Result<PolicyProfile, PolicyError> {
    let (default_ns, default_node) = match identity.rsplit_once('/') {
        Some(("", node)) => ("/", node),
        Some((ns, node)) => (ns, node),
        None => ("/", identity),
    };

    let namespace = element.attribute("ns").unwrap_or(default_ns);
    let node = element.attribute("node").unwrap_or(default_node);
    if node.trim().is_empty() {
        return Err(PolicyError::UnsupportedPolicy(format!(
            "context {} 的 profile 节点名为空",
            identity
        )));
    }

    Ok(PolicyProfile {
        scope: ProfileScope::new(namespace.trim(), node.trim()),
        permissions: element.elements().cloned().collect(),
    })
}
