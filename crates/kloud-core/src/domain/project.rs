//! 소셜 임팩트 프로젝트 펀딩 레코드.

use std::fmt;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{KloudError, KloudResult};

/// 프로젝트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Proposed,
    Active,
    Completed,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Proposed => write!(f, "proposed"),
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Completed => write!(f, "completed"),
        }
    }
}

/// 소셜 프로젝트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// 프로젝트 ID
    pub id: String,
    /// 이름
    pub name: String,
    /// 분류 (water, education, energy ...)
    pub category: String,
    /// 설명
    pub description: String,
    /// 목표 금액
    pub funding_goal: Decimal,
    /// 현재 모금액. 절대 감소하지 않는다.
    pub current_funding: Decimal,
    /// 상태
    pub status: ProjectStatus,
    /// 수혜자 수
    pub beneficiaries: u64,
    /// CO2 감축량 (톤)
    pub co2_offset_tons: Decimal,
    /// 마지막 갱신 시각 (epoch millis)
    pub last_updated: i64,
}

impl Project {
    /// 새 프로젝트 생성.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        funding_goal: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            funding_goal,
            current_funding: Decimal::ZERO,
            status: ProjectStatus::Active,
            beneficiaries: 0,
            co2_offset_tons: Decimal::ZERO,
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    /// 초기 모금액 지정. 완료 여부를 다시 계산합니다.
    pub fn with_funding(mut self, current_funding: Decimal) -> Self {
        self.current_funding = current_funding;
        self.refresh_status();
        self
    }

    pub fn with_impact(mut self, beneficiaries: u64, co2_offset_tons: Decimal) -> Self {
        self.beneficiaries = beneficiaries;
        self.co2_offset_tons = co2_offset_tons;
        self
    }

    /// 모금 진행률 (%).
    pub fn progress_pct(&self) -> Decimal {
        if self.funding_goal.is_zero() {
            return dec!(100);
        }
        (self.current_funding / self.funding_goal * dec!(100)).round_dp(2)
    }

    /// 틱마다 모금액과 임팩트 지표를 증가시킵니다.
    ///
    /// `active` 프로젝트만 바뀝니다.
    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.status != ProjectStatus::Active {
            return;
        }

        let increment = Decimal::from(rng.gen_range(50u32..=500));
        self.current_funding += increment;
        self.beneficiaries += rng.gen_range(0u64..=5);
        self.co2_offset_tons += Decimal::new(rng.gen_range(0i64..=50), 2);
        self.refresh_status();
        self.touch();
    }

    /// 명시적 펀딩.
    ///
    /// 0 이하의 금액은 거부합니다. 상태와 관계없이 반영됩니다.
    pub fn fund(&mut self, amount: Decimal) -> KloudResult<()> {
        if amount <= Decimal::ZERO {
            return Err(KloudError::InvalidAmount(amount.to_string()));
        }
        self.current_funding += amount;
        self.refresh_status();
        self.touch();
        Ok(())
    }

    /// 외부 피드 값 병합. 모금액과 임팩트 지표는 더 큰 값만 받아들입니다.
    pub fn merge_from(&mut self, incoming: &Project) {
        self.current_funding = self.current_funding.max(incoming.current_funding);
        self.beneficiaries = self.beneficiaries.max(incoming.beneficiaries);
        self.co2_offset_tons = self.co2_offset_tons.max(incoming.co2_offset_tons);
        if self.status == ProjectStatus::Proposed && incoming.status == ProjectStatus::Active {
            self.status = ProjectStatus::Active;
        }
        self.refresh_status();
        self.touch();
    }

    /// `current_funding >= funding_goal`이면 `completed`. 되돌아가지 않는다.
    fn refresh_status(&mut self) {
        if self.current_funding >= self.funding_goal {
            self.status = ProjectStatus::Completed;
        }
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now().timestamp_millis();
    }
}

/// 프로세스 시작 시 적재되는 프로젝트 목록.
pub fn seed_projects() -> Vec<Project> {
    vec![
        Project::new("proj-001", "Clean Water Wells", "water", dec!(50000))
            .with_description("Solar-powered wells for rural villages")
            .with_funding(dec!(32000))
            .with_impact(1200, dec!(0)),
        Project::new("proj-002", "Coding Bootcamp Scholarships", "education", dec!(75000))
            .with_description("Tuition for underrepresented developers")
            .with_funding(dec!(41250))
            .with_impact(85, dec!(0)),
        Project::new("proj-003", "Reforestation Drive", "environment", dec!(120000))
            .with_description("Native tree planting on degraded land")
            .with_funding(dec!(18400))
            .with_impact(300, dec!(412.5)),
        Project::new("proj-004", "Community Solar Microgrid", "energy", dec!(200000))
            .with_description("Shared solar capacity for a remote clinic")
            .with_status(ProjectStatus::Proposed),
    ]
}
