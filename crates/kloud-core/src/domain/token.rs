//! KLOUD 토큰 지표와 채굴 수익 배분 계산.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::project::{Project, ProjectStatus};
use crate::error::{KloudError, KloudResult};

/// 토큰 심볼.
pub const TOKEN_SYMBOL: &str = "KLOUD";

/// 유통량.
const CIRCULATING_SUPPLY: Decimal = dec!(250000000);

/// 기준 가격 (USD).
const REFERENCE_PRICE: Decimal = dec!(0.0847);

/// 보유자 수.
const HOLDERS: u64 = 18_432;

/// 한 달 환산 일수.
const DAYS_PER_MONTH: Decimal = dec!(30);

/// 토큰 지표 응답.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    pub symbol: String,
    pub price: Decimal,
    pub market_cap: Decimal,
    pub circulating_supply: Decimal,
    pub holders: u64,
    /// 전체 프로젝트 누적 모금액
    pub total_social_funding: Decimal,
    pub projects_completed: usize,
    pub active_projects: usize,
    pub timestamp: i64,
}

impl TokenMetrics {
    /// 현재 프로젝트 스냅샷으로부터 지표 계산.
    pub fn from_projects(projects: &[Project]) -> Self {
        let total_social_funding = projects.iter().map(|p| p.current_funding).sum();
        let count = |status| projects.iter().filter(|p| p.status == status).count();

        Self {
            symbol: TOKEN_SYMBOL.to_string(),
            price: REFERENCE_PRICE,
            market_cap: (REFERENCE_PRICE * CIRCULATING_SUPPLY).round_dp(2),
            circulating_supply: CIRCULATING_SUPPLY,
            holders: HOLDERS,
            total_social_funding,
            projects_completed: count(ProjectStatus::Completed),
            active_projects: count(ProjectStatus::Active),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// 채굴 수익 배분 요청.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    /// 일일 채굴 수익
    pub daily_profit: Decimal,
    /// 소셜 프로젝트 배분 비율 (%)
    pub allocation_percentage: Decimal,
}

/// 채굴 수익 배분 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningAllocation {
    pub daily_profit: Decimal,
    pub allocation_percentage: Decimal,
    pub social_allocation: Decimal,
    pub retained_profit: Decimal,
    pub monthly_social_projection: Decimal,
}

impl MiningAllocation {
    /// 배분 계산.
    ///
    /// 음수 수익이나 0~100 범위를 벗어난 비율은 거부합니다.
    pub fn compute(request: &AllocationRequest) -> KloudResult<Self> {
        if request.daily_profit < Decimal::ZERO {
            return Err(KloudError::InvalidInput(format!(
                "dailyProfit must be non-negative, got {}",
                request.daily_profit
            )));
        }
        if request.allocation_percentage < Decimal::ZERO || request.allocation_percentage > dec!(100) {
            return Err(KloudError::InvalidInput(format!(
                "allocationPercentage must be within 0..=100, got {}",
                request.allocation_percentage
            )));
        }

        let social_allocation = (request.daily_profit * request.allocation_percentage / dec!(100)).round_dp(2);

        Ok(Self {
            daily_profit: request.daily_profit,
            allocation_percentage: request.allocation_percentage,
            social_allocation,
            retained_profit: request.daily_profit - social_allocation,
            monthly_social_projection: social_allocation * DAYS_PER_MONTH,
        })
    }
}
