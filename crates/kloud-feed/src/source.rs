//! 업데이트 루프의 데이터 소스.
//!
//! 시뮬레이션 랜덤 워크와 외부 HTTP 피드가 같은 인터페이스를 구현하므로
//! 허브나 루프를 건드리지 않고 실제 피드로 교체할 수 있습니다.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use kloud_core::{DataSourceKind, KloudError, ServiceConfig, Update};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{FeedError, FeedResult};

/// 외부 피드 요청 타임아웃.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// 틱마다 하나의 갱신을 만들어내는 데이터 소스.
#[async_trait]
pub trait DataSource<R>: Send + Sync {
    /// 로그/메트릭용 이름.
    fn name(&self) -> &str;

    /// 다음 갱신.
    async fn next_update(&self) -> FeedResult<Update<R>>;
}

/// 저장소 자체의 랜덤 워크를 사용하는 소스.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedSource;

#[async_trait]
impl<R: Send + 'static> DataSource<R> for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn next_update(&self) -> FeedResult<Update<R>> {
        Ok(Update::Perturb)
    }
}

/// JSON 레코드 배열을 반환하는 외부 HTTP 피드.
pub struct ExternalFeedSource<R> {
    client: reqwest::Client,
    url: String,
    _record: PhantomData<fn() -> R>,
}

impl<R> ExternalFeedSource<R> {
    pub fn new(url: impl Into<String>) -> FeedResult<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            _record: PhantomData,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<R> DataSource<R> for ExternalFeedSource<R>
where
    R: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        "external"
    }

    async fn next_update(&self) -> FeedResult<Update<R>> {
        let records: Vec<R> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(url = %self.url, count = records.len(), "Fetched feed records");
        Ok(Update::Replace(records))
    }
}

/// 서비스 설정에 맞는 데이터 소스 생성.
pub fn from_config<R>(config: &ServiceConfig) -> FeedResult<Box<dyn DataSource<R>>>
where
    R: DeserializeOwned + Send + 'static,
{
    match config.data_source {
        DataSourceKind::Simulated => Ok(Box::new(SimulatedSource)),
        DataSourceKind::External => {
            let url = config.feed_url.as_deref().ok_or_else(|| {
                FeedError::Domain(KloudError::Config(
                    "feed_url is required when data_source = \"external\"".to_string(),
                ))
            })?;
            Ok(Box::new(ExternalFeedSource::<R>::new(url)?))
        }
    }
}
