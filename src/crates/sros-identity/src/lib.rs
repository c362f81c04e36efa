//! # 密钥库与身份管理
//!
//! 密钥库的完整生命周期：创建 CA、签发身份证书、维护序列号与签发
//! 索引、为权限文件和治理文档签名，以及生成安全日志配置。
//!
//! ## 使用示例
//!
//! ```no_run
//! use sros_identity::{Keystore, KeystoreConfig};
//! use std::path::Path;
//!
//! let root = Path::new("/tmp/keystore");
//! let keystore = Keystore::initialize(root, &KeystoreConfig::default())?;
//! keystore.provision_identity("/talker")?;
//! for identity in keystore.enumerate_identities() {
//!     println!("{}", identity);
//! }
//! # Ok::<(), sros_identity::KeystoreError>(())
//! ```

pub mod ca;
pub mod config;
pub mod database;
pub mod envelope;
pub mod error;
pub mod governance;
pub mod keystore;
pub mod security_log;

pub use ca::{CertificateAuthority, IdentityCertificate};
pub use config::{ConfigError, KeystoreConfig, KeystoreConfigBuilder};
pub use database::{CaDatabase, IssuedCertificate, INITIAL_SERIAL};
pub use envelope::SignedEnvelope;
pub use error::KeystoreError;
pub use keystore::{Identities, Keystore};
pub use security_log::{enable_logging, security_log_document, LoggingOptions, Verbosity};
