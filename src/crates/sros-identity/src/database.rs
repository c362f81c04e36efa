//! # CA 数据库
//!
//! 序列号计数器（`serial`，十六进制）与签发索引（`index.txt`）。
//! 索引采用 OpenSSL `ca` 的格式，每行一条签发记录：
//!
//! ```text
//! V	<到期时间 YYMMDDHHMMSSZ>		<序列号>	unknown	/CN=<主题>
//! ```
//!
//! 分配序列号时先把递增后的计数写回磁盘再返回，即使随后签名失败，
//! 同一个序列号也不会被再次使用。

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::KeystoreError;

/// 新密钥库的起始序列号
pub const INITIAL_SERIAL: u64 = 0x1000;

pub const SERIAL_FILE: &str = "serial";
pub const INDEX_FILE: &str = "index.txt";

const EXPIRY_FORMAT: &str = "%y%m%d%H%M%SZ";

/// 一条签发记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub serial: u64,
    pub subject: String,
    /// OpenSSL UTCTime 形式的到期时间
    pub expires: String,
}

impl IssuedCertificate {
    pub fn new(serial: u64, subject: impl Into<String>, not_after: DateTime<Utc>) -> Self {
        Self { serial, subject: subject.into(), expires: not_after.format(EXPIRY_FORMAT).to_string() }
    }

    fn to_line(&self) -> String {
        format!("V\t{}\t\t{:X}\tunknown\t/CN={}\n", self.expires, self.serial, self.subject)
    }

    fn from_line(line: &str) -> Result<Self, KeystoreError> {
        let malformed = || KeystoreError::Verification(format!("无法解析签发记录: {:?}", line));

        let fields: Vec<&str> = line.split('\t').collect();
        let [status, expires, _revoked, serial, _file, subject] = fields.as_slice() else {
            return Err(malformed());
        };
        if *status != "V" {
            return Err(malformed());
        }

        Ok(Self {
            serial: u64::from_str_radix(serial, 16).map_err(|_| malformed())?,
            subject: subject.strip_prefix("/CN=").ok_or_else(malformed)?.to_string(),
            expires: expires.to_string(),
        })
    }
}

/// 序列号与签发索引
#[derive(Debug, Clone)]
pub struct CaDatabase {
    serial_path: PathBuf,
    index_path: PathBuf,
}

impl CaDatabase {
    pub fn at(root: &Path) -> Self {
        Self { serial_path: root.join(SERIAL_FILE), index_path: root.join(INDEX_FILE) }
    }

    /// 写入初始计数和空索引
    pub fn create(root: &Path) -> Result<Self, KeystoreError> {
        let database = Self::at(root);
        database.write_serial(INITIAL_SERIAL)?;
        fs::write(&database.index_path, b"")?;
        Ok(database)
    }

    /// 下一个待分配的序列号
    pub fn next_serial(&self) -> Result<u64, KeystoreError> {
        let text = fs::read_to_string(&self.serial_path)?;
        u64::from_str_radix(text.trim(), 16).map_err(|e| {
            KeystoreError::Verification(format!("序列号文件内容无效 {:?}: {}", text.trim(), e))
        })
    }

    /// 分配一个序列号并立即持久化递增后的计数
    pub fn allocate_serial(&self) -> Result<u64, KeystoreError> {
        let serial = self.next_serial()?;
        let next = serial
            .checked_add(1)
            .ok_or_else(|| KeystoreError::Verification("序列号已耗尽".to_string()))?;
        self.write_serial(next)?;
        debug!("分配序列号 {:X}", serial);
        Ok(serial)
    }

    /// 追加签发记录
    pub fn record(&self, issued: &IssuedCertificate) -> Result<(), KeystoreError> {
        let mut index = OpenOptions::new().append(true).create(true).open(&self.index_path)?;
        index.write_all(issued.to_line().as_bytes())?;
        Ok(())
    }

    /// 读取全部签发记录
    pub fn issued(&self) -> Result<Vec<IssuedCertificate>, KeystoreError> {
        fs::read_to_string(&self.index_path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(IssuedCertificate::from_line)
            .collect()
    }

    fn write_serial(&self, serial: u64) -> Result<(), KeystoreError> {
        fs::write(&self.serial_path, format!("{:X}\n", serial))?;
        Ok(())
    }
}
