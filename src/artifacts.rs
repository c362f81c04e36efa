//! # 权限文件生成
//!
//! 顶层流程：确保密钥库存在，签发命令行指定的身份，再逐个编译策略
//! 文件并签名生成的权限文件。
//!
//! 每个策略文件的处理顺序是 加载 → 编译 → 签发缺失身份 → 签名，
//! 编译阶段不触碰密钥库，所以校验失败的策略文件不会写入任何内容。
//! 流程按顺序执行，遇到第一个错误即停止；之前已经写入的文件保留，
//! 不做回滚。

use error::{ErrorInfo, ErrorKind, ErrorCategory};
use sros_identity::{Keystore, KeystoreConfig, KeystoreError};
use sros_permissions::{PolicyCompiler, PolicyDocument, PolicyError};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 默认密钥库根目录的环境变量
pub const KEYSTORE_ENV: &str = "ROS_SECURITY_ROOT_DIRECTORY";

/// 生成流程错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// 策略文件加载或编译失败
    Policy {
        path: PathBuf,
        source: PolicyError,
    },

    /// 密钥库操作失败
    Keystore(KeystoreError),

    /// 没有指定密钥库且环境变量未设置
    MissingKeystoreRoot {
        variable: String,
    },
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactError::Policy { path, source } => {
                write!(f, "策略文件 {} 无效: {}", path.display(), source)
            }
            ArtifactError::Keystore(err) => write!(f, "{}", err),
            ArtifactError::MissingKeystoreRoot { variable } => {
                write!(f, "未指定密钥库路径，且环境变量 {} 未设置", variable)
            }
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Policy { source, .. } => Some(source),
            ArtifactError::Keystore(err) => Some(err),
            ArtifactError::MissingKeystoreRoot { .. } => None,
        }
    }
}

impl ErrorKind for ArtifactError {
    fn error_code(&self) -> u32 {
        match self {
            ArtifactError::Policy { source, .. } => source.error_code(),
            ArtifactError::Keystore(err) => err.error_code(),
            ArtifactError::MissingKeystoreRoot { .. } => 2001,
        }
    }

    fn error_category(&self) -> ErrorCategory {
        match self {
            ArtifactError::Policy { source, .. } => source.error_category(),
            ArtifactError::Keystore(err) => err.error_category(),
            ArtifactError::MissingKeystoreRoot { .. } => ErrorCategory::Usage,
        }
    }
}

impl From<KeystoreError> for ArtifactError {
    fn from(err: KeystoreError) -> Self {
        ArtifactError::Keystore(err)
    }
}

impl From<ArtifactError> for ErrorInfo {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::Policy { path, source } => {
                ErrorInfo::from(source).with_context(format!("策略文件: {}", path.display()))
            }
            ArtifactError::Keystore(err) => err.into(),
            other => ErrorInfo::from_kind(&other),
        }
    }
}

/// 确定密钥库根目录：优先使用显式路径，其次是环境变量
pub fn resolve_keystore_root(explicit: Option<&Path>) -> Result<PathBuf, ArtifactError> {
    resolve_keystore_root_from(explicit, std::env::var_os(KEYSTORE_ENV))
}

pub fn resolve_keystore_root_from(
    explicit: Option<&Path>,
    environment: Option<OsString>,
) -> Result<PathBuf, ArtifactError> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    environment
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| ArtifactError::MissingKeystoreRoot { variable: KEYSTORE_ENV.to_string() })
}

/// 一次生成流程的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// 本次是否新建了密钥库
    pub keystore_created: bool,
    /// 本次签发的身份，按签发顺序
    pub provisioned: Vec<String>,
    /// 本次签名的权限文件，按签名顺序
    pub sealed: Vec<PathBuf>,
}

/// 权限文件生成器
#[derive(Debug, Clone)]
pub struct ArtifactOrchestrator {
    config: KeystoreConfig,
    compiler: PolicyCompiler,
}

impl ArtifactOrchestrator {
    /// `config` 只在需要新建密钥库时使用；已有密钥库沿用其 `ca_conf.toml`
    pub fn new(config: KeystoreConfig) -> Self {
        let compiler = PolicyCompiler::new().with_validity_days(config.validity_days);
        Self { config, compiler }
    }

    pub fn generate_artifacts(
        &self,
        root: &Path,
        identities: &[String],
        policy_files: &[PathBuf],
    ) -> Result<GenerationReport, ArtifactError> {
        let mut report = GenerationReport::default();

        let keystore = if Keystore::is_valid(root) {
            Keystore::open(root)?
        } else {
            warn!("未找到密钥库 {}，正在创建", root.display());
            report.keystore_created = true;
            Keystore::initialize(root, &self.config)?
        };

        for identity in identities {
            ensure_identity(&keystore, identity, &mut report)?;
        }

        for path in policy_files {
            info!("编译策略文件: {}", path.display());
            let policy_error = |source| ArtifactError::Policy { path: path.clone(), source };

            let document = PolicyDocument::load(path).map_err(policy_error)?;
            let artifacts = self.compiler.compile(&document).map_err(policy_error)?;

            for identity in self.compiler.resolve_identities(&document) {
                ensure_identity(&keystore, &identity, &mut report)?;
            }
            for artifact in &artifacts {
                report.sealed.push(keystore.seal_artifact(artifact)?);
            }
        }

        info!(
            "生成完成：签发 {} 个身份，签名 {} 份权限文件",
            report.provisioned.len(),
            report.sealed.len()
        );
        Ok(report)
    }
}

fn ensure_identity(
    keystore: &Keystore,
    identity: &str,
    report: &mut GenerationReport,
) -> Result<(), ArtifactError> {
    if keystore.contains_identity(identity) {
        debug!("身份 {} 已存在，跳过签发", identity);
        return Ok(());
    }
    keystore.provision_identity(identity)?;
    report.provisioned.push(identity.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_root_resolution() {
        let explicit = Path::new("/explicit");
        assert_eq!(
            resolve_keystore_root_from(Some(explicit), Some(OsString::from("/env"))).unwrap(),
            PathBuf::from("/explicit")
        );
        assert_eq!(
            resolve_keystore_root_from(None, Some(OsString::from("/env"))).unwrap(),
            PathBuf::from("/env")
        );
        for environment in [None, Some(OsString::new())] {
            assert_eq!(
                resolve_keystore_root_from(None, environment).unwrap_err(),
                ArtifactError::MissingKeystoreRoot { variable: KEYSTORE_ENV.to_string() }
            );
        }
    }

    #[test]
    fn test_error_info_keeps_policy_code_and_file() {
        let err = ArtifactError::Policy {
            path: PathBuf::from("policy.xml"),
            source: PolicyError::UnsupportedQualifier { qualifier: "MAYBE".to_string() },
        };
        assert!(err.to_string().contains("MAYBE"));

        let info: ErrorInfo = err.into();
        assert_eq!(info.code(), 4001);
        assert_eq!(info.category(), ErrorCategory::Policy);
        assert_eq!(info.context(), ["策略文件: policy.xml".to_string()]);

        let info: ErrorInfo =
            ArtifactError::MissingKeystoreRoot { variable: KEYSTORE_ENV.to_string() }.into();
        assert_eq!(info.category(), ErrorCategory::Usage);
    }
}
