//! WebSocket 엔드포인트 계산.
//!
//! 대시보드가 로드된 origin의 스킴을 따라 `https` → `wss`, `http` → `ws`를
//! 고르고 스트림 종류에 맞는 경로를 붙입니다.

use std::fmt;
use std::str::FromStr;

use kloud_core::MessageType;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// 구독할 스트림.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// 채굴 장비 텔레메트리 (`/mining-ws`)
    Mining,
    /// 소셜 프로젝트 펀딩 (`/social-ws`)
    Social,
}

impl StreamKind {
    pub fn path(&self) -> &'static str {
        match self {
            StreamKind::Mining => "/mining-ws",
            StreamKind::Social => "/social-ws",
        }
    }

    /// 이 스트림의 스냅샷 태그.
    pub fn update_type(&self) -> MessageType {
        match self {
            StreamKind::Mining => MessageType::RigsUpdate,
            StreamKind::Social => MessageType::ProjectsUpdate,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Mining => write!(f, "mining"),
            StreamKind::Social => write!(f, "social"),
        }
    }
}

impl FromStr for StreamKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mining" | "rigs" => Ok(Self::Mining),
            "social" | "projects" => Ok(Self::Social),
            _ => Err(ClientError::InvalidEndpoint(format!("unknown stream: {s}"))),
        }
    }
}

/// origin과 스트림 종류로 WebSocket URL을 만듭니다.
pub fn endpoint_for(origin: &str, kind: StreamKind) -> ClientResult<Url> {
    let mut url =
        Url::parse(origin).map_err(|e| ClientError::InvalidEndpoint(format!("{origin}: {e}")))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::InvalidEndpoint(format!(
                "unsupported scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;
    url.set_path(kind.path());
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
