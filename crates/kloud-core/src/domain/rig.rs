//! 채굴 장비 텔레메트리 레코드.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::KloudError;

/// 온도 하한 (°C).
pub const TEMPERATURE_MIN: f64 = 35.0;

/// 온도 상한 (°C).
pub const TEMPERATURE_MAX: f64 = 65.0;

/// 틱당 최대 온도 변화 (°C).
const TEMPERATURE_STEP: f64 = 1.5;

/// 틱당 최대 해시레이트 변화 (기준값 대비 비율).
const HASHRATE_STEP: f64 = 0.02;

/// 해시레이트 허용 범위 (기준값 대비 비율).
const HASHRATE_BAND: (f64, f64) = (0.90, 1.10);

/// 전력 노이즈 (비율).
const POWER_NOISE: f64 = 0.01;

/// 장비 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigType {
    /// ASIC 채굴기 (TH/s)
    Asic,
    /// GPU 채굴기 (MH/s)
    Gpu,
}

impl RigType {
    /// 기준 해시레이트.
    pub fn baseline_hashrate(&self) -> f64 {
        match self {
            RigType::Asic => 110.0,
            RigType::Gpu => 480.0,
        }
    }

    /// 해시레이트 단위.
    pub fn hashrate_unit(&self) -> &'static str {
        match self {
            RigType::Asic => "TH/s",
            RigType::Gpu => "MH/s",
        }
    }

    /// 기준 소비 전력 (W).
    pub fn baseline_power(&self) -> f64 {
        match self {
            RigType::Asic => 3250.0,
            RigType::Gpu => 1400.0,
        }
    }
}

/// 장비 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigStatus {
    Online,
    Offline,
    Maintenance,
    Error,
    Restarting,
}

impl fmt::Display for RigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigStatus::Online => write!(f, "online"),
            RigStatus::Offline => write!(f, "offline"),
            RigStatus::Maintenance => write!(f, "maintenance"),
            RigStatus::Error => write!(f, "error"),
            RigStatus::Restarting => write!(f, "restarting"),
        }
    }
}

/// 장비 제어 명령.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigCommand {
    Start,
    Shutdown,
    Restart,
    Maintenance,
}

impl RigCommand {
    /// 명령 적용 직후의 상태.
    pub fn target_status(&self) -> RigStatus {
        match self {
            RigCommand::Start => RigStatus::Online,
            RigCommand::Shutdown => RigStatus::Offline,
            RigCommand::Restart => RigStatus::Restarting,
            RigCommand::Maintenance => RigStatus::Maintenance,
        }
    }
}

impl FromStr for RigCommand {
    type Err = KloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(RigCommand::Start),
            "shutdown" => Ok(RigCommand::Shutdown),
            "restart" => Ok(RigCommand::Restart),
            "maintenance" => Ok(RigCommand::Maintenance),
            other => Err(KloudError::InvalidCommand(other.to_string())),
        }
    }
}

/// 채굴 장비.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rig {
    /// 장비 ID
    pub id: String,
    /// 표시 이름
    pub name: String,
    /// 장비 종류
    pub rig_type: RigType,
    /// 상태
    pub status: RigStatus,
    /// 해시레이트 (ASIC: TH/s, GPU: MH/s)
    pub hashrate: f64,
    /// 소비 전력 (W)
    pub power_draw: f64,
    /// 온도 (°C)
    pub temperature: f64,
    /// 효율 (해시레이트 단위당 W)
    pub efficiency: f64,
    /// 누적 가동 시간 (초)
    pub uptime_secs: u64,
    /// 마지막 갱신 시각 (epoch millis)
    pub last_updated: i64,
}

impl Rig {
    /// 기준값으로 가동 중인 장비 생성.
    pub fn new(id: impl Into<String>, name: impl Into<String>, rig_type: RigType) -> Self {
        let hashrate = rig_type.baseline_hashrate();
        let power_draw = rig_type.baseline_power();
        Self {
            id: id.into(),
            name: name.into(),
            rig_type,
            status: RigStatus::Online,
            hashrate,
            power_draw,
            temperature: 45.0,
            efficiency: efficiency(power_draw, hashrate),
            uptime_secs: 0,
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    /// 상태 지정.
    pub fn with_status(mut self, status: RigStatus) -> Self {
        self.set_status(status);
        self
    }

    /// 온도 지정.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// 가동 중인지 확인.
    pub fn is_active(&self) -> bool {
        self.status == RigStatus::Online
    }

    /// 한 틱만큼 텔레메트리를 흔듭니다.
    ///
    /// `online` 장비만 바뀌며 상태는 절대 바뀌지 않습니다.
    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R, elapsed: Duration) {
        if !self.is_active() {
            return;
        }

        let baseline = self.rig_type.baseline_hashrate();
        let step = baseline * rng.gen_range(-HASHRATE_STEP..=HASHRATE_STEP);
        self.hashrate = (self.hashrate + step).clamp(baseline * HASHRATE_BAND.0, baseline * HASHRATE_BAND.1);

        let ratio = self.hashrate / baseline;
        let noise = 1.0 + rng.gen_range(-POWER_NOISE..=POWER_NOISE);
        self.power_draw = self.rig_type.baseline_power() * ratio * noise;

        let delta = rng.gen_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        self.temperature = (self.temperature + delta).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);

        self.efficiency = efficiency(self.power_draw, self.hashrate);
        self.uptime_secs += elapsed.as_secs();
        self.touch();
    }

    /// 명령 적용.
    pub fn apply_command(&mut self, command: RigCommand) {
        self.set_status(command.target_status());
    }

    /// 재시작 완료. 여전히 `restarting`일 때만 `online`으로 전이합니다.
    ///
    /// 전이가 일어나면 `true`.
    pub fn complete_restart(&mut self) -> bool {
        if self.status != RigStatus::Restarting {
            return false;
        }
        self.set_status(RigStatus::Online);
        true
    }

    /// 외부 피드 값 병합.
    ///
    /// 텔레메트리 필드만 받아들이고 상태는 유지합니다. `online`이 아닌 장비는
    /// 출력이 0으로 고정되어 있으므로 건너뜁니다.
    pub fn merge_from(&mut self, incoming: &Rig) {
        if !self.is_active() {
            return;
        }
        self.hashrate = incoming.hashrate.max(0.0);
        self.power_draw = incoming.power_draw.max(0.0);
        self.temperature = incoming.temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
        self.uptime_secs = incoming.uptime_secs;
        self.efficiency = efficiency(self.power_draw, self.hashrate);
        self.touch();
    }

    fn set_status(&mut self, status: RigStatus) {
        self.status = status;
        match status {
            RigStatus::Online => {
                if self.hashrate <= 0.0 {
                    self.hashrate = self.rig_type.baseline_hashrate();
                    self.power_draw = self.rig_type.baseline_power();
                }
            }
            RigStatus::Offline | RigStatus::Restarting | RigStatus::Error => {
                self.hashrate = 0.0;
                self.power_draw = 0.0;
                self.uptime_secs = 0;
            }
            RigStatus::Maintenance => {
                self.hashrate = 0.0;
                self.power_draw = 0.0;
            }
        }
        self.efficiency = efficiency(self.power_draw, self.hashrate);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now().timestamp_millis();
    }
}

/// 해시레이트 단위당 소비 전력. 해시레이트가 0이면 0.
fn efficiency(power_draw: f64, hashrate: f64) -> f64 {
    if hashrate > 0.0 {
        power_draw / hashrate
    } else {
        0.0
    }
}

/// 프로세스 시작 시 적재되는 장비 목록.
pub fn seed_rigs() -> Vec<Rig> {
    vec![
        Rig::new("rig-001", "Antminer S19 Pro #1", RigType::Asic).with_temperature(42.0),
        Rig::new("rig-002", "Antminer S19 Pro #2", RigType::Asic).with_temperature(47.0),
        Rig::new("rig-003", "RTX 4090 Cluster", RigType::Gpu).with_temperature(58.0),
        Rig::new("rig-004", "Whatsminer M30S", RigType::Asic)
            .with_temperature(38.0)
            .with_status(RigStatus::Maintenance),
    ]
}
