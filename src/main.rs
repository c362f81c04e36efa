//! # SROS 命令行入口
//!
//! 子命令对应密钥库的各项操作。成功返回 0，操作失败时把诊断信息
//! 写到 stderr 并返回 1，参数错误由 clap 处理并返回 2。

use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand};
use error::ErrorInfo;
use sros::{
    enable_logging, resolve_keystore_root, ArtifactOrchestrator, AppResult, Keystore,
    LoggingOptions, SrosConfig, Verbosity,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "sros", version, about = "DDS 安全密钥库与权限文件管理工具")]
struct Cli {
    /// 提高日志详细程度（-v 为 debug，-vv 为 trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 创建密钥库，已存在时不做改动
    CreateKeystore {
        root: PathBuf,
    },

    /// 在已有密钥库中签发一个身份
    CreateKey {
        root: PathBuf,
        identity: String,
    },

    /// 列出密钥库中的身份
    ListKeys {
        root: PathBuf,
    },

    /// 签发身份并由策略文件生成签名的权限文件
    GenerateArtifacts {
        /// 密钥库路径，默认取 ROS_SECURITY_ROOT_DIRECTORY
        #[arg(short = 'k', long = "keystore-root-path")]
        keystore_root_path: Option<PathBuf>,

        /// 需要签发的身份
        #[arg(short = 'c', long = "security-contexts", alias = "enclaves", num_args = 1..)]
        security_contexts: Vec<String>,

        /// 策略文件
        #[arg(short = 'p', long = "policy-files", num_args = 1..)]
        policy_files: Vec<PathBuf>,
    },

    /// 为身份生成安全日志配置
    EnableLogging {
        root: PathBuf,

        /// 省略时为密钥库中的所有身份
        identity: Option<String>,

        #[arg(long, default_value = "ERROR", value_parser = parse_verbosity)]
        verbosity: Verbosity,

        #[command(flatten)]
        target: LoggingTarget,
    },

    /// 验证身份的签名权限文件
    Verify {
        root: PathBuf,
        identity: String,
    },
}

/// 日志输出位置，至少指定一个
#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
struct LoggingTarget {
    /// 日志文件路径
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    log_file: Option<String>,

    /// 通过 DDS 发布日志
    #[arg(long)]
    distribute: bool,
}

fn parse_verbosity(value: &str) -> Result<Verbosity, String> {
    value.parse().map_err(|e| {
        let names: Vec<&str> = Verbosity::ALL.iter().map(Verbosity::as_str).collect();
        format!("{}（可选值: {}）", e, names.join(", "))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("错误: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> AppResult<()> {
    let config = SrosConfig::discover()?;
    init_tracing(&config, cli.verbose)?;

    match cli.command {
        Command::CreateKeystore { root } => {
            let keystore = Keystore::initialize(&root, &config.keystore)?;
            info!("密钥库就绪: {}", keystore.root().display());
        }
        Command::CreateKey { root, identity } => {
            let keystore = Keystore::open(&root)?;
            let issued = keystore.provision_identity(&identity)?;
            info!("已签发身份 {}，序列号 {:#X}", identity, issued.serial);
        }
        Command::ListKeys { root } => {
            let keystore = Keystore::open(&root)?;
            for identity in keystore.enumerate_identities() {
                println!("{}", identity.trim_start_matches('/'));
            }
        }
        Command::GenerateArtifacts { keystore_root_path, security_contexts, policy_files } => {
            let root = resolve_keystore_root(keystore_root_path.as_deref())?;
            let report = ArtifactOrchestrator::new(config.keystore)
                .generate_artifacts(&root, &security_contexts, &policy_files)?;
            for identity in &report.provisioned {
                info!("签发身份: {}", identity);
            }
            for path in &report.sealed {
                info!("签名权限文件: {}", path.display());
            }
        }
        Command::EnableLogging { root, identity, verbosity, target } => {
            let options = LoggingOptions {
                verbosity,
                log_file: target.log_file,
                distribute: target.distribute,
            };
            let written = enable_logging(&root, identity.as_deref(), &options)?;
            info!("写入 {} 份日志配置", written.len());
        }
        Command::Verify { root, identity } => {
            let keystore = Keystore::open(&root)?;
            keystore.verify_governance()?;
            let artifact = keystore.verify_artifact(&identity)?;
            println!(
                "{}: 签名有效，{} 条权限，有效期至 {}",
                artifact.identity(),
                artifact.permissions().len(),
                artifact.validity().not_after
            );
        }
    }
    Ok(())
}

/// 初始化日志，输出到 stderr
fn init_tracing(config: &SrosConfig, verbose: u8) -> Result<(), ErrorInfo> {
    let level = match verbose {
        0 => config.logging.max_level()?,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
    debug!("日志级别: {}", level);
    Ok(())
}
