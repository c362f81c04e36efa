//! # SROS 安全工具
//!
//! 管理 DDS 安全所需的全部文件：自建 CA 的密钥库、每个节点身份的
//! 证书和私钥、由访问控制策略编译并签名的权限文件，以及安全日志配置。
//!
//! ## 模块架构
//!
//! ```text
//! sros/
//! ├── src/
//! │   ├── main.rs         # 命令行入口
//! │   ├── lib.rs          # 库入口
//! │   ├── artifacts.rs    # 权限文件生成流程
//! │   ├── config.rs       # 工具配置
//! │   └── crates/
//! │       ├── error/              # 错误处理框架
//! │       ├── sros-permissions/   # 权限模型、策略文档、策略编译
//! │       └── sros-identity/      # 密钥库、CA、签名、日志配置
//! ```
//!
//! ## 使用示例
//!
//! ```no_run
//! use sros::{ArtifactOrchestrator, KeystoreConfig};
//! use std::path::{Path, PathBuf};
//!
//! let orchestrator = ArtifactOrchestrator::new(KeystoreConfig::default());
//! let report = orchestrator.generate_artifacts(
//!     Path::new("/tmp/keystore"),
//!     &["/talker".to_string()],
//!     &[PathBuf::from("policy.xml")],
//! )?;
//! println!("签名了 {} 份权限文件", report.sealed.len());
//! # Ok::<(), sros::ArtifactError>(())
//! ```

pub mod artifacts;
pub mod config;

use error::ErrorInfo;

pub use artifacts::{
    resolve_keystore_root, resolve_keystore_root_from, ArtifactError, ArtifactOrchestrator,
    GenerationReport, KEYSTORE_ENV,
};
pub use config::{LoggingConfig, SrosConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};

// 重新导出密钥库与策略模块
pub use sros_identity::{
    enable_logging, Keystore, KeystoreConfig, KeystoreError, LoggingOptions, Verbosity,
};
pub use sros_permissions::{PermissionArtifact, PolicyCompiler, PolicyDocument, PolicyError};

/// 应用程序结果类型
pub type AppResult<T> = std::result::Result<T, ErrorInfo>;
