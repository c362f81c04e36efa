//! # 名称表达式
//!
//! 表达式是权限规则所作用的名称模式。策略中的相对名称按所属 profile
//! 的命名空间和全限定名解析为绝对名称后再写入权限文件。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PolicyError;

/// profile 的命名作用域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileScope {
    pub namespace: String,
    pub node: String,
}

impl ProfileScope {
    pub fn new(namespace: impl Into<String>, node: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), node: node.into() }
    }

    /// 全限定名，例如 `/ns` + `talker` 得到 `/ns/talker`
    pub fn fqn(&self) -> String {
        join(&self.namespace, &self.node)
    }
}

/// 已解析的名称表达式
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expression(String);

impl Expression {
    /// 按作用域解析策略中的名称模式
    ///
    /// - `/chatter` 保持不变
    /// - `~` 与 `~/x` 相对于全限定名
    /// - 其余名称相对于命名空间
    pub fn resolve(pattern: &str, scope: &ProfileScope) -> Result<Self, PolicyError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PolicyError::UnsupportedPolicy(format!(
                "节点 {} 的权限包含空表达式",
                scope.fqn()
            )));
        }

        let name = if pattern.starts_with('/') {
            pattern.to_string()
        } else if let Some(private) = pattern.strip_prefix('~') {
            let private = private.trim_start_matches('/');
            if private.is_empty() {
                scope.fqn()
            } else {
                join(&scope.fqn(), private)
            }
        } else {
            join(&scope.namespace, pattern)
        };

        Ok(Self(name))
    }

    /// 从权限文件中读取已经是绝对形式的名称
    pub fn absolute(name: &str) -> Result<Self, PolicyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PolicyError::UnsupportedPolicy("权限包含空表达式".to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        format!("/{}", name)
    } else if base.starts_with('/') {
        format!("{}/{}", base, name)
    } else {
        format!("/{}/{}", base, name)
    }
}
