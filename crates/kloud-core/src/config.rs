//! 설정 관리.
//!
//! 기본값 → `config/default.toml`(선택) → `KLOUD__` 접두사 환경 변수 순으로
//! 덮어쓰고, 마지막으로 서비스 포트 환경 변수(`MINING_PORT`, `SOCIAL_PORT`)를
//! 적용합니다.
//!
//! ```text
//! KLOUD__MINING__TICK_INTERVAL_SECS=2
//! KLOUD__SOCIAL__DATA_SOURCE=external
//! KLOUD__SOCIAL__FEED_URL=http://feeds.internal/projects
//! MINING_PORT=4001
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KloudError, KloudResult};

/// 채굴 서비스 포트 환경 변수.
pub const MINING_PORT_ENV: &str = "MINING_PORT";

/// 소셜 서비스 포트 환경 변수.
pub const SOCIAL_PORT_ENV: &str = "SOCIAL_PORT";

/// 채굴 서비스 기본 포트.
pub const DEFAULT_MINING_PORT: u16 = 3001;

/// 소셜 서비스 기본 포트.
pub const DEFAULT_SOCIAL_PORT: u16 = 3002;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 채굴 장비 텔레메트리 서비스
    pub mining: ServiceConfig,
    /// 소셜 프로젝트 펀딩 서비스
    pub social: ServiceConfig,
    /// 클라이언트 연결 설정
    pub client: ClientConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mining: ServiceConfig::mining(),
            social: ServiceConfig::social(),
            client: ClientConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// 데이터 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// 랜덤 워크 시뮬레이션
    #[default]
    Simulated,
    /// 외부 HTTP 피드
    External,
}

/// 개별 피드 서비스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 업데이트 루프 간격 (초)
    pub tick_interval_secs: u64,
    /// 재시작 명령 완료까지의 지연 (초)
    pub restart_delay_secs: u64,
    /// 데이터 소스
    #[serde(default)]
    pub data_source: DataSourceKind,
    /// 외부 피드 URL (`data_source = "external"`일 때 필수)
    #[serde(default)]
    pub feed_url: Option<String>,
}

impl ServiceConfig {
    /// 채굴 서비스 기본값 (5초 틱).
    pub fn mining() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_MINING_PORT,
            tick_interval_secs: 5,
            restart_delay_secs: 10,
            data_source: DataSourceKind::Simulated,
            feed_url: None,
        }
    }

    /// 소셜 서비스 기본값 (30초 틱).
    pub fn social() -> Self {
        Self {
            port: DEFAULT_SOCIAL_PORT,
            tick_interval_secs: 30,
            ..Self::mining()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    /// `host:port` 문자열.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 설정 검증.
    pub fn validate(&self) -> KloudResult<()> {
        if self.data_source == DataSourceKind::External && self.feed_url.is_none() {
            return Err(KloudError::Config(
                "feed_url is required when data_source = \"external\"".to_string(),
            ));
        }
        Ok(())
    }
}

/// 클라이언트 연결 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// 대시보드가 로드된 origin (예: `https://dashboard.example.com`)
    pub origin: String,
    /// 재연결 프로파일 (`stable` | `capped`)
    pub profile: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: format!("http://127.0.0.1:{}", DEFAULT_MINING_PORT),
            profile: "stable".to_string(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다. 파일이 없어도 됩니다.
    pub fn load<P: AsRef<Path>>(path: P) -> KloudResult<Self> {
        let mining = ServiceConfig::mining();
        let social = ServiceConfig::social();
        let client = ClientConfig::default();
        let logging = LoggingConfig::default();

        let builder = config::Config::builder()
            .set_default("mining.host", mining.host)?
            .set_default("mining.port", i64::from(mining.port))?
            .set_default("mining.tick_interval_secs", mining.tick_interval_secs as i64)?
            .set_default("mining.restart_delay_secs", mining.restart_delay_secs as i64)?
            .set_default("social.host", social.host)?
            .set_default("social.port", i64::from(social.port))?
            .set_default("social.tick_interval_secs", social.tick_interval_secs as i64)?
            .set_default("social.restart_delay_secs", social.restart_delay_secs as i64)?
            .set_default("client.origin", client.origin)?
            .set_default("client.profile", client.profile)?
            .set_default("logging.level", logging.level)?
            .set_default("logging.format", logging.format)?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("KLOUD")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_port_overrides(|key| std::env::var(key).ok());
        config.mining.validate()?;
        config.social.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> KloudResult<Self> {
        Self::load("config/default.toml")
    }

    /// 서비스 포트 환경 변수 적용. 파싱할 수 없는 값은 무시합니다.
    fn apply_port_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u16>().ok());

        if let Some(p) = port(MINING_PORT_ENV) {
            self.mining.port = p;
        }
        if let Some(p) = port(SOCIAL_PORT_ENV) {
            self.social.port = p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.mining.port, 3001);
        assert_eq!(config.social.port, 3002);
        assert_eq!(config.mining.tick_interval(), Duration::from_secs(5));
        assert_eq!(config.social.tick_interval(), Duration::from_secs(30));
        assert_eq!(config.client.profile, "stable");
    }

    #[test]
    fn test_port_overrides() {
        let mut config = AppConfig::default();
        config.apply_port_overrides(|key| match key {
            MINING_PORT_ENV => Some("4001".to_string()),
            SOCIAL_PORT_ENV => Some("not-a-port".to_string()),
            _ => None,
        });

        assert_eq!(config.mining.port, 4001);
        assert_eq!(config.social.port, 3002);
    }

    #[test]
    fn test_external_source_requires_url() {
        let mut service = ServiceConfig::social();
        service.data_source = DataSourceKind::External;
        assert!(service.validate().is_err());

        service.feed_url = Some("http://localhost:9000/projects".to_string());
        assert!(service.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();

        assert_eq!(config.mining.tick_interval_secs, 5);
        assert_eq!(config.social.tick_interval_secs, 30);
        assert_eq!(config.logging.level, "info");
    }
}
