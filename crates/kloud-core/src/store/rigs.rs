//! 채굴 장비 저장소.

use std::collections::HashMap;
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, warn};

use super::RecordStore;
use crate::domain::{seed_rigs, MessageType, Rig, RigCommand, RigStatus};
use crate::error::{KloudError, KloudResult};

/// 채굴 장비 저장소.
#[derive(Debug, Clone)]
pub struct RigStore {
    rigs: Vec<Rig>,
    /// 틱 간격 (가동 시간 누적용)
    tick_period: Duration,
    /// 장비별 명령 세대. 명령이 적용될 때마다 증가합니다.
    generations: HashMap<String, u64>,
}

impl RigStore {
    /// 주어진 레코드로 저장소 생성.
    pub fn new(rigs: Vec<Rig>, tick_period: Duration) -> Self {
        Self {
            rigs,
            tick_period,
            generations: HashMap::new(),
        }
    }

    /// 기본 시드 목록으로 생성.
    pub fn seeded(tick_period: Duration) -> Self {
        Self::new(seed_rigs(), tick_period)
    }

    /// ID로 조회.
    pub fn get(&self, id: &str) -> Option<&Rig> {
        self.rigs.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: &str) -> KloudResult<&mut Rig> {
        self.rigs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| KloudError::NotFound(id.to_string()))
    }

    /// 명령 적용.
    ///
    /// 장비 조회가 먼저이므로 알 수 없는 ID는 명령어와 무관하게 `NotFound`입니다.
    pub fn apply_command(&mut self, id: &str, command: &str) -> KloudResult<Rig> {
        let rig = self.get_mut(id)?;
        let command: RigCommand = command.parse()?;
        rig.apply_command(command);
        let rig = rig.clone();

        let generation = self.generations.entry(id.to_string()).or_default();
        *generation += 1;
        debug!(rig_id = %id, status = %rig.status, generation = *generation, "Rig command applied");
        Ok(rig)
    }

    /// 마지막으로 적용된 명령의 세대. 명령이 없었으면 0.
    pub fn command_generation(&self, id: &str) -> u64 {
        self.generations.get(id).copied().unwrap_or_default()
    }

    /// 재시작 타이머 완료 처리.
    ///
    /// 예약 이후 다른 명령이 없었고(`generation` 일치) 장비가 여전히 `restarting`일 때만
    /// `online`으로 전이하고 `true`를 반환합니다.
    pub fn complete_restart(&mut self, id: &str, generation: u64) -> bool {
        if self.command_generation(id) != generation {
            return false;
        }
        match self.get_mut(id) {
            Ok(rig) => rig.complete_restart(),
            Err(_) => false,
        }
    }

    /// 상태별 장비 수.
    pub fn count_by_status(&self, status: RigStatus) -> usize {
        self.rigs.iter().filter(|r| r.status == status).count()
    }
}

impl RecordStore for RigStore {
    type Record = Rig;

    fn update_type(&self) -> MessageType {
        MessageType::RigsUpdate
    }

    fn records(&self) -> &[Rig] {
        &self.rigs
    }

    fn tick(&mut self, rng: &mut dyn RngCore) {
        for rig in self.rigs.iter_mut() {
            rig.perturb(rng, self.tick_period);
        }
    }

    fn merge(&mut self, incoming: Vec<Rig>) -> usize {
        let mut applied = 0;
        for record in incoming {
            match self.rigs.iter_mut().find(|r| r.id == record.id) {
                Some(rig) => {
                    rig.merge_from(&record);
                    applied += 1;
                }
                None => warn!(rig_id = %record.id, "Ignoring feed record for unknown rig"),
            }
        }
        applied
    }
}
