//! 소셜 프로젝트 저장소.

use rand::RngCore;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::RecordStore;
use crate::domain::{seed_projects, MessageType, Project, TokenMetrics};
use crate::error::{KloudError, KloudResult};

/// 소셜 프로젝트 저장소.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    projects: Vec<Project>,
}

impl ProjectStore {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    /// 기본 시드 목록으로 생성.
    pub fn seeded() -> Self {
        Self::new(seed_projects())
    }

    /// ID로 조회.
    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// 프로젝트에 금액을 펀딩합니다.
    pub fn fund(&mut self, id: &str, amount: Decimal) -> KloudResult<Project> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| KloudError::NotFound(id.to_string()))?;

        project.fund(amount)?;
        debug!(
            project_id = %id,
            amount = %amount,
            funding = %project.current_funding,
            status = %project.status,
            "Project funded"
        );
        Ok(project.clone())
    }

    /// 현재 상태 기준 토큰 지표.
    pub fn token_metrics(&self) -> TokenMetrics {
        TokenMetrics::from_projects(&self.projects)
    }
}

impl RecordStore for ProjectStore {
    type Record = Project;

    fn update_type(&self) -> MessageType {
        MessageType::ProjectsUpdate
    }

    fn records(&self) -> &[Project] {
        &self.projects
    }

    fn tick(&mut self, rng: &mut dyn RngCore) {
        for project in self.projects.iter_mut() {
            project.perturb(rng);
        }
    }

    fn merge(&mut self, incoming: Vec<Project>) -> usize {
        let mut applied = 0;
        for record in incoming {
            match self.projects.iter_mut().find(|p| p.id == record.id) {
                Some(project) => {
                    project.merge_from(&record);
                    applied += 1;
                }
                None => warn!(project_id = %record.id, "Ignoring feed record for unknown project"),
            }
        }
        applied
    }
}
