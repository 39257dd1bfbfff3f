//! Market data collector CLI.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pulse_collector::{CollectorConfig, ConfigOverrides, ExitStatus, RunController};
use pulse_core::{init_logging, LogConfig, LogFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "pulse-collector")]
#[command(about = "Daily market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// 서브커맨드 없이 실행할 때의 옵션
    #[command(flatten)]
    run: RunArgs,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 레지스트리의 모든 티커를 한 번 수집 (기본)
    Run(RunArgs),
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// 티커 레지스트리 CSV 경로
    #[arg(long)]
    registry: Option<PathBuf>,

    /// 저장 루트 디렉토리
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 동시에 처리할 최대 티커 수
    #[arg(long)]
    concurrency: Option<usize>,
}

impl From<RunArgs> for ConfigOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            registry_path: args.registry,
            output_dir: args.output_dir,
            concurrency: args.concurrency,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "수집기 실행 실패");
            eprintln!("error: {:#}", e);
            ExitCode::from(ExitStatus::Fatal.code())
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitStatus> {
    dotenvy::dotenv().ok();

    // --log-level은 RUST_LOG보다 우선
    let mut log_config = LogConfig::from_env().with_level_override(cli.log_level);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "시장 데이터 수집기 시작");

    let args = match cli.command {
        Some(Commands::Run(args)) => args,
        None => cli.run,
    };
    let config = CollectorConfig::from_env()
        .context("failed to load configuration")?
        .with_overrides(args.into());
    tracing::debug!(?config, "설정 로드 완료");

    let controller = RunController::from_config(config).context("failed to set up providers")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("인터럽트 수신, 실행 취소");
            interrupt.cancel();
        }
    });

    let status = controller.run_to_exit(&cancel).await;
    tracing::info!(exit_code = status.code(), "시장 데이터 수집기 종료");
    Ok(status)
}
