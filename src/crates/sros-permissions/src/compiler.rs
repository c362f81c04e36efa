//! # 策略编译器
//!
//! 把 [`PolicyDocument`] 编译为每个身份一份的 [`PermissionArtifact`]。
//! 编译是纯计算：不访问密钥库，不写文件。任何校验错误都会中止整个
//! 编译，不会返回部分结果。

use tracing::{debug, info};

use crate::artifact::{permission_from_element, PermissionArtifact, Validity};
use crate::error::PolicyError;
use crate::expression::Expression;
use crate::policy::PolicyDocument;

/// 权限文件的默认有效期（天）
pub const DEFAULT_VALIDITY_DAYS: u32 = 3650;

/// 策略编译器
#[derive(Debug, Clone)]
pub struct PolicyCompiler {
    validity_days: u32,
}

impl Default for PolicyCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyCompiler {
    pub fn new() -> Self {
        Self { validity_days: DEFAULT_VALIDITY_DAYS }
    }

    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// 文档引用的全部身份，按首次出现的顺序去重
    pub fn resolve_identities(&self, document: &PolicyDocument) -> Vec<String> {
        let mut identities: Vec<String> = Vec::new();
        for context in document.contexts() {
            if !identities.contains(&context.identity) {
                identities.push(context.identity.clone());
            }
        }
        identities
    }

    /// 编译文档
    ///
    /// 同一身份出现在多个 context 中时，权限按文档顺序合并到同一份文件。
    pub fn compile(&self, document: &PolicyDocument) -> Result<Vec<PermissionArtifact>, PolicyError> {
        let validity = Validity::from_now(self.validity_days);
        let mut artifacts: Vec<PermissionArtifact> = Vec::new();

        for context in document.contexts() {
            let index = match artifacts.iter().position(|a| a.identity() == context.identity) {
                Some(index) => index,
                None => {
                    artifacts.push(PermissionArtifact::new(context.identity.as_str(), validity));
                    artifacts.len() - 1
                }
            };

            for profile in &context.profiles {
                let resolve = |pattern: &str| Expression::resolve(pattern, &profile.scope);
                for element in &profile.permissions {
                    let permission = permission_from_element(element, resolve)?;
                    debug!(
                        "身份 {} 新增 {} 权限，{} 个表达式",
                        context.identity,
                        permission.permission_type(),
                        permission.expressions().len()
                    );
                    artifacts[index].push_permission(permission);
                }
            }
        }

        info!("策略编译完成，共 {} 个身份", artifacts.len());
        Ok(artifacts)
    }
}
