//! # 访问控制策略
//!
//! 权限模型、策略文档和策略编译器。
//!
//! ```text
//! PolicyDocument ──► PolicyCompiler ──► Vec<PermissionArtifact> ──► permissions.xml
//! ```
//!
//! 权限、能力和表达式都是不可变的值类型，文档映射由 [`artifact`]
//! 模块单独完成。

pub mod artifact;
pub mod capability;
pub mod compiler;
pub mod document;
pub mod error;
pub mod expression;
pub mod permission;
pub mod policy;

pub use artifact::{PermissionArtifact, Validity, VALIDITY_FORMAT};
pub use capability::{Capability, CapabilityType, Qualifier};
pub use compiler::{PolicyCompiler, DEFAULT_VALIDITY_DAYS};
pub use document::{Element, Node};
pub use error::PolicyError;
pub use expression::{Expression, ProfileScope};
pub use permission::{Permission, PermissionType};
pub use policy::{check_identity_path, PolicyContext, PolicyDocument, PolicyProfile};
