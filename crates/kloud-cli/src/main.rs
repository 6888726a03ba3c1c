//! Kloud Bot 대시보드 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 채굴 장비 스트림 구독 (재연결 5회 제한)
//! kloud watch -s mining -p capped
//!
//! # 장비 목록 / 재시작
//! kloud rigs
//! kloud command rig-001 restart
//!
//! # 프로젝트 후원
//! kloud fund proj-001 2500
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kloud_client::{ConnectionProfile, StreamKind};
use kloud_core::{init_logging, AppConfig, LogConfig};
use rust_decimal::Decimal;
use tracing::error;

use kloud_cli::commands::rest::ApiClient;
use kloud_cli::commands::watch::{format_projects, format_rigs, watch, WatchOptions};

#[derive(Parser)]
#[command(name = "kloud")]
#[command(about = "Kloud Bot CLI - 채굴/소셜 피드 실시간 구독 및 제어", long_about = None)]
#[command(version)]
struct Cli {
    /// 채굴 서비스 주소 (기본값: 설정의 client.origin)
    #[arg(long, env = "KLOUD_MINING_URL", global = true)]
    mining_url: Option<String>,

    /// 소셜 서비스 주소 (기본값: http://127.0.0.1:<social.port>)
    #[arg(long, env = "KLOUD_SOCIAL_URL", global = true)]
    social_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 실시간 스냅샷 구독
    Watch {
        /// 스트림 (mining, social)
        #[arg(short, long, default_value = "mining")]
        stream: StreamKind,

        /// 재연결 프로파일 (stable, capped). 기본값은 설정의 client.profile
        #[arg(short, long)]
        profile: Option<ConnectionProfile>,

        /// 지정한 수만큼 스냅샷을 받으면 종료
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// 채굴 장비 조회
    Rigs {
        /// 장비 ID (생략 시 전체)
        id: Option<String>,
    },

    /// 채굴 장비 명령 (start, stop, restart, shutdown)
    Command {
        /// 장비 ID
        id: String,

        /// 명령어
        command: String,
    },

    /// 소셜 프로젝트 조회
    Projects {
        /// 프로젝트 ID (생략 시 전체)
        id: Option<String>,
    },

    /// 프로젝트 후원
    Fund {
        /// 프로젝트 ID
        id: String,

        /// 후원 금액
        amount: Decimal,
    },

    /// 토큰 지표 조회
    Token,
}

impl Cli {
    fn mining_origin(&self, config: &AppConfig) -> String {
        self.mining_url
            .clone()
            .unwrap_or_else(|| config.client.origin.clone())
    }

    fn social_origin(&self, config: &AppConfig) -> String {
        self.social_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", config.social.port))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load_default().context("Failed to load configuration")?;
    init_logging(LogConfig::from_config(&config.logging))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Watch {
            stream,
            profile,
            limit,
        } => {
            let profile = match profile {
                Some(profile) => *profile,
                None => config
                    .client
                    .profile
                    .parse()
                    .context("Invalid client.profile in configuration")?,
            };
            let origin = match stream {
                StreamKind::Mining => cli.mining_origin(&config),
                StreamKind::Social => cli.social_origin(&config),
            };

            watch(WatchOptions {
                origin,
                stream: *stream,
                profile,
                limit: *limit,
            })
            .await
        }

        Commands::Rigs { id } => {
            let api = ApiClient::new(&cli.mining_origin(&config))?;
            match id {
                Some(id) => api.rig(id).await.and_then(|rig| print_json(&rig)),
                None => api.rigs().await.map(|rigs| println!("{}", format_rigs(&rigs))),
            }
        }

        Commands::Command { id, command } => {
            let api = ApiClient::new(&cli.mining_origin(&config))?;
            api.command(id, command).await.and_then(|rig| print_json(&rig))
        }

        Commands::Projects { id } => {
            let api = ApiClient::new(&cli.social_origin(&config))?;
            match id {
                Some(id) => api.project(id).await.and_then(|project| print_json(&project)),
                None => api
                    .projects()
                    .await
                    .map(|projects| println!("{}", format_projects(&projects))),
            }
        }

        Commands::Fund { id, amount } => {
            let api = ApiClient::new(&cli.social_origin(&config))?;
            api.fund(id, *amount).await.and_then(|project| print_json(&project))
        }

        Commands::Token => {
            let api = ApiClient::new(&cli.social_origin(&config))?;
            api.token_metrics().await.and_then(|metrics| print_json(&metrics))
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}
