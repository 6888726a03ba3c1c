//! 인메모리 레코드 저장소.
//!
//! 저장소는 프로세스 시작 시 고정 시드 목록으로 만들어지고, 실행 중에는
//! 생성/삭제 없이 제자리에서만 변경됩니다. 소유권은 브로드캐스트 허브에 있으며
//! 클라이언트는 직렬화된 스냅샷 복사본만 받습니다.

pub mod projects;
pub mod rigs;

pub use projects::ProjectStore;
pub use rigs::RigStore;

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{Envelope, MessageType};
use crate::error::KloudResult;

/// 한 틱에 적용할 갱신.
#[derive(Debug, Clone)]
pub enum Update<R> {
    /// 시뮬레이션 랜덤 워크
    Perturb,
    /// 외부 피드에서 받은 레코드 병합 (ID 기준)
    Replace(Vec<R>),
}

/// 허브가 소유하는 저장소의 공통 인터페이스.
pub trait RecordStore: Send + 'static {
    /// 저장되는 레코드 타입
    type Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// 스냅샷 봉투 태그.
    fn update_type(&self) -> MessageType;

    /// 현재 레코드 목록.
    fn records(&self) -> &[Self::Record];

    /// 활성 레코드에 한 틱만큼 섭동을 적용합니다.
    fn tick(&mut self, rng: &mut dyn RngCore);

    /// 외부 레코드 병합. 알 수 없는 ID는 무시하고, 반영된 레코드 수를 반환합니다.
    fn merge(&mut self, incoming: Vec<Self::Record>) -> usize;

    /// 갱신 적용.
    fn apply(&mut self, update: Update<Self::Record>, rng: &mut dyn RngCore) -> usize {
        match update {
            Update::Perturb => {
                self.tick(rng);
                self.records().len()
            }
            Update::Replace(records) => self.merge(records),
        }
    }

    /// 현재 상태 전체를 담은 스냅샷 봉투.
    fn snapshot(&self) -> KloudResult<Envelope> {
        Envelope::with_payload(self.update_type(), &self.records())
    }
}
