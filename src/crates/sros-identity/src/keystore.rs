//! # 密钥库
//!
//! 密钥库根目录保存 CA 材料、序列号计数、签发索引和治理文档，每个身份
//! 一个子目录。对序列号和索引的修改都只经过这里的操作。
//!
//! ```text
//! <root>/
//! ├── ca.key.pem  ca.cert.pem  ca_conf.toml
//! ├── serial  index.txt
//! ├── governance.xml  governance.p7s
//! └── <identity>/
//!     ├── key.pem  cert.pem  req.pem
//!     ├── identity_ca.cert.pem  permissions_ca.cert.pem  governance.p7s
//!     └── permissions.xml  permissions.p7s  [logging.xml]
//! ```
//!
//! 同一个根目录同时只应有一个进程在操作，序列号分配没有跨进程加锁。

use chrono::{DateTime, Utc};
use sros_permissions::{check_identity_path, PermissionArtifact, Validity};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ca::CertificateAuthority;
use crate::config::KeystoreConfig;
use crate::database::{CaDatabase, IssuedCertificate, INDEX_FILE, SERIAL_FILE};
use crate::envelope::SignedEnvelope;
use crate::error::KeystoreError;
use crate::governance::default_governance;

pub const CA_KEY_FILE: &str = "ca.key.pem";
pub const CA_CERT_FILE: &str = "ca.cert.pem";
pub const CONFIG_FILE: &str = "ca_conf.toml";
pub const GOVERNANCE_FILE: &str = "governance.xml";
pub const GOVERNANCE_SIGNATURE_FILE: &str = "governance.p7s";

pub const KEY_FILE: &str = "key.pem";
pub const CERT_FILE: &str = "cert.pem";
pub const REQUEST_FILE: &str = "req.pem";
pub const IDENTITY_CA_FILE: &str = "identity_ca.cert.pem";
pub const PERMISSIONS_CA_FILE: &str = "permissions_ca.cert.pem";
pub const PERMISSIONS_FILE: &str = "permissions.xml";
pub const PERMISSIONS_SIGNATURE_FILE: &str = "permissions.p7s";

/// 有效密钥库必须具备的文件
const REQUIRED_FILES: [&str; 5] =
    [CA_KEY_FILE, CA_CERT_FILE, SERIAL_FILE, INDEX_FILE, GOVERNANCE_SIGNATURE_FILE];

/// 已打开的密钥库
#[derive(Debug)]
pub struct Keystore {
    root: PathBuf,
    config: KeystoreConfig,
    authority: CertificateAuthority,
    database: CaDatabase,
}

impl Keystore {
    /// 目录中是否具备密钥库的最小 CA 文件集合
    pub fn is_valid(root: &Path) -> bool {
        root.is_dir() && REQUIRED_FILES.iter().all(|file| root.join(file).is_file())
    }

    /// 创建密钥库
    ///
    /// 已是有效密钥库时直接打开，不做任何修改。目录中只有部分密钥库
    /// 文件时拒绝创建。
    pub fn initialize(root: &Path, config: &KeystoreConfig) -> Result<Self, KeystoreError> {
        if Self::is_valid(root) {
            info!("密钥库 {} 已存在，保持不变", root.display());
            return Self::open(root);
        }

        let leftovers: Vec<&str> = REQUIRED_FILES
            .iter()
            .chain([CONFIG_FILE, GOVERNANCE_FILE].iter())
            .copied()
            .filter(|file| root.join(file).exists())
            .collect();
        if !leftovers.is_empty() {
            return Err(KeystoreError::Creation(format!(
                "{} 包含不完整的密钥库文件 {:?}",
                root.display(),
                leftovers
            )));
        }
        if root.exists() && !root.is_dir() {
            return Err(KeystoreError::Creation(format!("{} 不是目录", root.display())));
        }

        config.validate()?;
        info!("创建密钥库: {}", root.display());

        let creation = |e: &dyn fmt::Display| KeystoreError::Creation(e.to_string());
        fs::create_dir_all(root).map_err(|e| creation(&e))?;

        let authority = CertificateAuthority::create(config)?;
        write_private(&root.join(CA_KEY_FILE), &authority.key_pem()).map_err(|e| creation(&e))?;
        fs::write(root.join(CA_CERT_FILE), authority.certificate_pem()).map_err(|e| creation(&e))?;
        config.save(&root.join(CONFIG_FILE)).map_err(|e| creation(&e))?;
        let database = CaDatabase::create(root).map_err(|e| creation(&e))?;

        let governance = default_governance().to_bytes().map_err(|e| creation(&e))?;
        fs::write(root.join(GOVERNANCE_FILE), &governance).map_err(|e| creation(&e))?;
        let signature = SignedEnvelope::seal(&governance, &authority)
            .and_then(|envelope| envelope.to_pem())
            .map_err(|e| creation(&e))?;
        // 最后写入签名，之前任何一步失败都不会留下"有效"的密钥库
        fs::write(root.join(GOVERNANCE_SIGNATURE_FILE), signature).map_err(|e| creation(&e))?;

        info!("密钥库创建完成，CA: {}", authority.common_name());
        Ok(Self { root: root.to_path_buf(), config: config.clone(), authority, database })
    }

    /// 打开已存在的密钥库
    pub fn open(root: &Path) -> Result<Self, KeystoreError> {
        if !Self::is_valid(root) {
            return Err(KeystoreError::InvalidKeystore(root.display().to_string()));
        }

        let config_path = root.join(CONFIG_FILE);
        let config = if config_path.is_file() {
            KeystoreConfig::load(&config_path)?
        } else {
            warn!("{} 缺少 {}，使用默认配置", root.display(), CONFIG_FILE);
            KeystoreConfig::default()
        };

        let key_pem = read_text(&root.join(CA_KEY_FILE))?;
        let certificate_pem = read_text(&root.join(CA_CERT_FILE))?;
        let authority = CertificateAuthority::load(&key_pem, &certificate_pem)?;

        debug!("已打开密钥库 {}", root.display());
        Ok(Self { root: root.to_path_buf(), config, authority, database: CaDatabase::at(root) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &KeystoreConfig {
        &self.config
    }

    pub fn ca_certificate_pem(&self) -> &str {
        self.authority.certificate_pem()
    }

    pub fn ca_common_name(&self) -> &str {
        self.authority.common_name()
    }

    /// 身份对应的目录，嵌套身份映射为嵌套目录
    pub fn identity_dir(&self, identity: &str) -> Result<PathBuf, String> {
        check_identity_path(identity)?;
        Ok(identity.split('/').filter(|s| !s.is_empty()).fold(self.root.clone(), |dir, s| dir.join(s)))
    }

    /// 身份是否已签发
    pub fn contains_identity(&self, identity: &str) -> bool {
        self.identity_dir(identity).map(|dir| dir.join(CERT_FILE).is_file()).unwrap_or(false)
    }

    /// 签发身份
    ///
    /// 生成密钥、CSR 和 CA 签发的证书，记录序列号，并写入默认拒绝的
    /// 权限文件。身份已存在时拒绝，不覆盖。
    pub fn provision_identity(&self, identity: &str) -> Result<IssuedCertificate, KeystoreError> {
        let dir = self.identity_dir(identity).map_err(|r| KeystoreError::provisioning(identity, r))?;
        if dir.join(CERT_FILE).exists() || dir.join(KEY_FILE).exists() {
            return Err(KeystoreError::provisioning(identity, "身份已存在"));
        }

        info!("签发身份: {}", identity);
        let provisioning = |e: &dyn fmt::Display| KeystoreError::provisioning(identity, e);
        let serial = self.database.allocate_serial().map_err(|e| provisioning(&e))?;
        let issued = self.authority.issue(identity, serial, self.config.validity_days)?;

        fs::create_dir_all(&dir).map_err(|e| provisioning(&e))?;

        write_private(&dir.join(KEY_FILE), &issued.key_pem).map_err(|e| provisioning(&e))?;
        fs::write(dir.join(CERT_FILE), &issued.certificate_pem).map_err(|e| provisioning(&e))?;
        fs::write(dir.join(REQUEST_FILE), &issued.request_pem).map_err(|e| provisioning(&e))?;
        for ca_copy in [IDENTITY_CA_FILE, PERMISSIONS_CA_FILE] {
            fs::write(dir.join(ca_copy), self.authority.certificate_pem())
                .map_err(|e| provisioning(&e))?;
        }
        fs::copy(self.root.join(GOVERNANCE_SIGNATURE_FILE), dir.join(GOVERNANCE_SIGNATURE_FILE))
            .map_err(|e| provisioning(&e))?;

        let expires = DateTime::<Utc>::from_timestamp(issued.not_after.unix_timestamp(), 0)
            .ok_or_else(|| provisioning(&"证书到期时间超出范围"))?;
        let record = IssuedCertificate::new(serial, identity, expires);
        self.database.record(&record).map_err(|e| provisioning(&e))?;

        let artifact =
            PermissionArtifact::deny_all(identity, Validity::from_now(self.config.validity_days));
        self.seal_artifact(&artifact)?;

        info!("身份 {} 签发完成，序列号 {:X}", identity, serial);
        Ok(record)
    }

    /// 写入并签名身份的权限文件
    pub fn seal_artifact(&self, artifact: &PermissionArtifact) -> Result<PathBuf, KeystoreError> {
        let identity = artifact.identity();
        let dir = self.identity_dir(identity).map_err(|r| KeystoreError::signing(identity, r))?;
        if !dir.join(CERT_FILE).is_file() {
            return Err(KeystoreError::signing(identity, "身份尚未签发"));
        }

        let signing = |e: &dyn fmt::Display| KeystoreError::signing(identity, e);
        let bytes = artifact.to_xml().map_err(|e| signing(&e))?;
        let envelope = SignedEnvelope::seal(&bytes, &self.authority)
            .and_then(|envelope| envelope.to_pem())
            .map_err(|e| signing(&e))?;

        let path = dir.join(PERMISSIONS_FILE);
        fs::write(&path, &bytes).map_err(|e| signing(&e))?;
        fs::write(dir.join(PERMISSIONS_SIGNATURE_FILE), envelope).map_err(|e| signing(&e))?;

        info!("已签名 {} 的权限文件，{} 条规则", identity, artifact.permissions().len());
        Ok(path)
    }

    /// 按目录层级排序、惰性遍历已签发的身份
    ///
    /// 每次调用都重新读取目录。
    pub fn enumerate_identities(&self) -> Identities {
        Identities { root: Some(self.root.clone()), stack: Vec::new() }
    }

    /// 签发索引中的全部记录
    pub fn issued_certificates(&self) -> Result<Vec<IssuedCertificate>, KeystoreError> {
        self.database.issued()
    }

    /// 下一个待分配的序列号
    pub fn next_serial(&self) -> Result<u64, KeystoreError> {
        self.database.next_serial()
    }

    /// 验证身份的权限签名，并确认签名内容与 `permissions.xml` 一致
    pub fn verify_artifact(&self, identity: &str) -> Result<PermissionArtifact, KeystoreError> {
        let dir = self.identity_dir(identity).map_err(KeystoreError::Verification)?;
        let content = self.verify_signed_file(
            &dir.join(PERMISSIONS_FILE),
            &dir.join(PERMISSIONS_SIGNATURE_FILE),
        )?;

        let artifact = PermissionArtifact::from_xml(&content)
            .map_err(|e| KeystoreError::Verification(e.to_string()))?;
        if artifact.identity() != identity {
            return Err(KeystoreError::Verification(format!(
                "权限文件属于 {}，而不是 {}",
                artifact.identity(),
                identity
            )));
        }

        debug!("身份 {} 的权限签名验证通过", identity);
        Ok(artifact)
    }

    /// 验证治理文档签名
    pub fn verify_governance(&self) -> Result<(), KeystoreError> {
        self.verify_signed_file(
            &self.root.join(GOVERNANCE_FILE),
            &self.root.join(GOVERNANCE_SIGNATURE_FILE),
        )
        .map(|_| ())
    }

    fn verify_signed_file(&self, document: &Path, signature: &Path) -> Result<Vec<u8>, KeystoreError> {
        let envelope = SignedEnvelope::from_pem(&read_text(signature)?)?;
        let content = envelope.verify(self.authority.certificate_pem())?;
        if read_bytes(document)? != content {
            return Err(KeystoreError::Verification(format!(
                "{} 与签名内容不一致",
                document.display()
            )));
        }
        Ok(content)
    }
}

/// 身份的惰性迭代器
///
/// 先序遍历：父目录本身是身份时先于其嵌套身份产出。
#[derive(Debug)]
pub struct Identities {
    root: Option<PathBuf>,
    stack: Vec<std::vec::IntoIter<(PathBuf, String)>>,
}

impl Iterator for Identities {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(root) = self.root.take() {
            self.stack.push(subdirectories(&root, ""));
        }

        loop {
            let level = self.stack.last_mut()?;
            match level.next() {
                Some((path, identity)) => {
                    let is_identity = path.join(CERT_FILE).is_file();
                    self.stack.push(subdirectories(&path, &identity));
                    if is_identity {
                        return Some(identity);
                    }
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn subdirectories(dir: &Path, prefix: &str) -> std::vec::IntoIter<(PathBuf, String)> {
    let mut entries: Vec<(PathBuf, String)> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                Some((entry.path(), format!("{}/{}", prefix, name)))
            })
            .collect(),
        Err(e) => {
            warn!("无法读取目录 {}: {}", dir.display(), e);
            Vec::new()
        }
    };
    entries.sort_by(|a, b| a.1.cmp(&b.1));
    entries.into_iter()
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, KeystoreError> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeystoreError::NotFound(path.display().to_string()),
        _ => KeystoreError::Io(format!("{}: {}", path.display(), e)),
    })
}

fn read_text(path: &Path) -> Result<String, KeystoreError> {
    String::from_utf8(read_bytes(path)?)
        .map_err(|_| KeystoreError::Verification(format!("{} 不是 UTF-8 文本", path.display())))
}

/// 写入私钥，Unix 上权限为 0600
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_dir_mapping() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::initialize(dir.path(), &KeystoreConfig::default()).unwrap();

        assert_eq!(keystore.identity_dir("/talker").unwrap(), dir.path().join("talker"));
        assert_eq!(
            keystore.identity_dir("/robot/talker").unwrap(),
            dir.path().join("robot").join("talker")
        );
        assert!(keystore.identity_dir("talker").is_err());
        assert!(keystore.identity_dir("/../escape").is_err());
    }

    #[test]
    fn test_partial_keystore_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CA_KEY_FILE), "stale").unwrap();

        assert!(!Keystore::is_valid(dir.path()));
        assert!(matches!(
            Keystore::initialize(dir.path(), &KeystoreConfig::default()),
            Err(KeystoreError::Creation(_))
        ));
    }

    #[test]
    fn test_open_requires_valid_root() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            Keystore::open(dir.path()).unwrap_err(),
            KeystoreError::InvalidKeystore(dir.path().display().to_string())
        );
    }

    #[test]
    fn test_enumeration_is_nested_and_sorted() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::initialize(dir.path(), &KeystoreConfig::default()).unwrap();
        for identity in ["/zeta", "/robot/talker", "/alpha", "/robot"] {
            keystore.provision_identity(identity).unwrap();
        }
        fs::create_dir(dir.path().join("not_an_identity")).unwrap();

        let identities: Vec<String> = keystore.enumerate_identities().collect();
        assert_eq!(identities, vec!["/alpha", "/robot", "/robot/talker", "/zeta"]);

        // 迭代器可以重新开始，并看到新的身份
        keystore.provision_identity("/beta").unwrap();
        assert_eq!(keystore.enumerate_identities().count(), 5);
    }

    #[test]
    fn test_governance_signature_verifies() {
        let dir = TempDir::new().unwrap();
        let keystore = Keystore::initialize(dir.path(), &KeystoreConfig::default()).unwrap();
        keystore.verify_governance().expect("治理文档签名应该有效");

        fs::write(dir.path().join(GOVERNANCE_FILE), "<dds/>").unwrap();
        assert!(matches!(keystore.verify_governance(), Err(KeystoreError::Verification(_))));
    }
}
