use crate::error::{AutopilotError, Result};
use crate::rebalance::Model;
use crate::types::{ActionKind, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_FILE: &str = "autopilot.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RiskConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub amount: f64,
    pub velocity: f64,
    pub novelty: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            amount: 0.5,
            velocity: 0.6,
            novelty: 0.3,
        }
    }
}

/// `elevated` is where a counter starts to look unusual; at `burst` the
/// velocity sub-score saturates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityThresholds {
    pub elevated: f64,
    pub burst: f64,
}

fn default_hourly() -> VelocityThresholds {
    VelocityThresholds {
        elevated: 20.0,
        burst: 50.0,
    }
}

fn default_daily() -> VelocityThresholds {
    VelocityThresholds {
        elevated: 100.0,
        burst: 1000.0,
    }
}

/// Score cut-offs for the allow/hold/escalate/deny recommendation. Anything
/// below `hold` is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    pub hold: f64,
    pub escalate: f64,
    pub deny: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            hold: 50.0,
            escalate: 70.0,
            deny: 85.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub weights: RiskWeights,
    #[serde(default = "default_hourly")]
    pub tx_per_hour: VelocityThresholds,
    #[serde(default = "default_daily")]
    pub tx_per_day: VelocityThresholds,
    /// Amount-to-median ratio at which the amount sub-score saturates.
    #[serde(default = "default_ratio_ceiling")]
    pub amount_ratio_ceiling: f64,
    /// Median used when the caller has no history for the actor.
    #[serde(default = "default_median_amount")]
    pub default_median_amount: u64,
    #[serde(default = "default_counter_cap")]
    pub counter_cap: f64,
    #[serde(default)]
    pub recommendation: RecommendationThresholds,
}

fn default_ratio_ceiling() -> f64 {
    1000.0
}

fn default_median_amount() -> u64 {
    1_000_000
}

fn default_counter_cap() -> f64 {
    1_000_000.0
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            tx_per_hour: default_hourly(),
            tx_per_day: default_daily(),
            amount_ratio_ceiling: default_ratio_ceiling(),
            default_median_amount: default_median_amount(),
            counter_cap: default_counter_cap(),
            recommendation: RecommendationThresholds::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleConfig
// ---------------------------------------------------------------------------

/// Base gas units per action kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasTable {
    pub transfer: u64,
    pub deposit: u64,
    pub harvest: u64,
    pub rebalance: u64,
}

impl Default for GasTable {
    fn default() -> Self {
        Self {
            transfer: 80_000,
            deposit: 150_000,
            harvest: 250_000,
            rebalance: 400_000,
        }
    }
}

impl GasTable {
    pub fn cost_of(&self, kind: ActionKind) -> u64 {
        match kind {
            ActionKind::Transfer => self.transfer,
            ActionKind::Deposit => self.deposit,
            ActionKind::Harvest => self.harvest,
            ActionKind::Rebalance => self.rebalance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Delay applied to `normal` urgency: one block on Sei.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
    /// Batch window cadence for `low` urgency.
    #[serde(default = "default_batch_cadence_secs")]
    pub batch_cadence_secs: u64,
    /// Minimum delay before an action whose risk recommendation is `hold`.
    #[serde(default = "default_risk_hold_secs")]
    pub risk_hold_secs: u64,
    #[serde(default)]
    pub gas: GasTable,
}

fn default_block_interval_ms() -> u64 {
    400
}

fn default_batch_cadence_secs() -> u64 {
    3600
}

fn default_risk_hold_secs() -> u64 {
    3600
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: default_block_interval_ms(),
            batch_cadence_secs: default_batch_cadence_secs(),
            risk_hold_secs: default_risk_hold_secs(),
            gas: GasTable::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// RebalanceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditConfig {
    /// Exploration bonus numerator; divided by the arm's observation count.
    #[serde(default = "default_exploration")]
    pub exploration: f64,
    #[serde(default = "default_observations")]
    pub default_observations: u32,
    /// Minimum weight for every arm with a positive APR.
    #[serde(default = "default_floor_weight")]
    pub floor_weight: f64,
}

fn default_exploration() -> f64 {
    0.05
}

fn default_observations() -> u32 {
    1
}

fn default_floor_weight() -> f64 {
    0.02
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            exploration: default_exploration(),
            default_observations: default_observations(),
            floor_weight: default_floor_weight(),
        }
    }
}

/// Linear value-function coefficients for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlCoefficients {
    #[serde(default)]
    pub bias: f64,
    #[serde(default = "one")]
    pub apr: f64,
    #[serde(default)]
    pub risk: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlConfig {
    /// Softmax temperature at zero risk tolerance.
    #[serde(default = "default_max_temperature")]
    pub max_temperature: f64,
    #[serde(default = "default_rl_coefficients")]
    pub coefficients: BTreeMap<Strategy, RlCoefficients>,
}

fn default_max_temperature() -> f64 {
    1.0
}

fn default_rl_coefficients() -> BTreeMap<Strategy, RlCoefficients> {
    let mut m = BTreeMap::new();
    for (strategy, risk) in [
        (Strategy::Staking, 0.02),
        (Strategy::Lending, 0.03),
        (Strategy::Lp, 0.08),
        (Strategy::PerpsHedge, 0.10),
    ] {
        m.insert(
            strategy,
            RlCoefficients {
                bias: 0.0,
                apr: 1.0,
                risk,
            },
        );
    }
    m
}

impl Default for RlConfig {
    fn default() -> Self {
        Self {
            max_temperature: default_max_temperature(),
            coefficients: default_rl_coefficients(),
        }
    }
}

impl RlConfig {
    pub fn coefficients_for(&self, strategy: Strategy) -> RlCoefficients {
        self.coefficients
            .get(&strategy)
            .cloned()
            .unwrap_or(RlCoefficients {
                bias: 0.0,
                apr: 1.0,
                risk: 0.0,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkowitzConfig {
    #[serde(default = "default_volatility")]
    pub default_volatility: f64,
    /// Cap on the APR penalty applied for volatility.
    #[serde(default = "default_max_penalty")]
    pub max_penalty: f64,
}

fn default_volatility() -> f64 {
    0.2
}

fn default_max_penalty() -> f64 {
    0.5
}

impl Default for MarkowitzConfig {
    fn default() -> Self {
        Self {
            default_volatility: default_volatility(),
            max_penalty: default_max_penalty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default)]
    pub default_model: Model,
    #[serde(default = "default_risk_tolerance")]
    pub default_risk_tolerance: u8,
    /// Upper bound on any single strategy's weight. 1.0 disables the cap.
    #[serde(default = "one")]
    pub max_single_allocation: f64,
    /// Minimum number of strategies a plan must hold.
    #[serde(default = "default_min_diversification")]
    pub min_diversification: usize,
    /// A plan is only worth executing if some leg moves by more than this
    /// many basis points from the current allocation.
    #[serde(default = "default_min_change_bps")]
    pub min_change_bps: u32,
    #[serde(default)]
    pub bandit: BanditConfig,
    #[serde(default)]
    pub rl: RlConfig,
    #[serde(default)]
    pub markowitz: MarkowitzConfig,
    /// Base risk of each strategy on a 0-100 scale, used for plan risk estimates.
    #[serde(default = "default_strategy_risk")]
    pub strategy_risk: BTreeMap<Strategy, f64>,
}

fn default_risk_tolerance() -> u8 {
    50
}

fn default_min_diversification() -> usize {
    2
}

fn default_min_change_bps() -> u32 {
    500
}

fn default_strategy_risk() -> BTreeMap<Strategy, f64> {
    BTreeMap::from([
        (Strategy::Staking, 20.0),
        (Strategy::Lending, 30.0),
        (Strategy::Lp, 55.0),
        (Strategy::PerpsHedge, 65.0),
    ])
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            default_model: Model::default(),
            default_risk_tolerance: default_risk_tolerance(),
            max_single_allocation: 1.0,
            min_diversification: default_min_diversification(),
            min_change_bps: default_min_change_bps(),
            bandit: BanditConfig::default(),
            rl: RlConfig::default(),
            markowitz: MarkowitzConfig::default(),
            strategy_risk: default_strategy_risk(),
        }
    }
}

impl RebalanceConfig {
    pub fn base_risk(&self, strategy: Strategy) -> f64 {
        self.strategy_risk.get(&strategy).copied().unwrap_or(50.0)
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig / ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the chain data service. Unset disables `/signals/refresh`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_initial_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7003
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            risk: RiskConfig::default(),
            schedule: ScheduleConfig::default(),
            rebalance: RebalanceConfig::default(),
            gateway: GatewayConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AutopilotError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` when given, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Write `self` to `path` unless a file is already there. Returns true if
    /// written.
    pub fn save_if_missing(&self, path: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(self)?;
        crate::io::write_if_missing(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        // 1. Risk weights and thresholds
        let w = &self.risk.weights;
        for (name, value) in [
            ("amount", w.amount),
            ("velocity", w.velocity),
            ("novelty", w.novelty),
        ] {
            if !value.is_finite() || value < 0.0 {
                error(format!("risk.weights.{name} must be a non-negative number, got {value}"));
            }
        }
        for (name, t) in [
            ("tx_per_hour", &self.risk.tx_per_hour),
            ("tx_per_day", &self.risk.tx_per_day),
        ] {
            if t.elevated <= 0.0 || t.burst <= t.elevated {
                error(format!(
                    "risk.{name}: need 0 < elevated < burst, got elevated={} burst={}",
                    t.elevated, t.burst
                ));
            }
        }
        if self.risk.amount_ratio_ceiling <= 1.0 {
            error(format!(
                "risk.amount_ratio_ceiling must be > 1, got {}",
                self.risk.amount_ratio_ceiling
            ));
        }
        if self.risk.default_median_amount == 0 {
            error("risk.default_median_amount must be positive".to_string());
        }
        let t = &self.risk.recommendation;
        if !(t.hold > 0.0 && t.hold < t.escalate && t.escalate < t.deny && t.deny <= 100.0) {
            error(format!(
                "risk.recommendation: need 0 < hold < escalate < deny <= 100, got hold={} escalate={} deny={}",
                t.hold, t.escalate, t.deny
            ));
        }

        // 2. Schedule
        if self.schedule.batch_cadence_secs == 0 {
            error("schedule.batch_cadence_secs must be positive".to_string());
        }
        if self.schedule.risk_hold_secs == 0 {
            error("schedule.risk_hold_secs must be positive".to_string());
        }

        // 3. Rebalance
        let r = &self.rebalance;
        if r.default_risk_tolerance > 100 {
            error(format!(
                "rebalance.default_risk_tolerance must be 0-100, got {}",
                r.default_risk_tolerance
            ));
        }
        if !(r.max_single_allocation > 0.0 && r.max_single_allocation <= 1.0) {
            error(format!(
                "rebalance.max_single_allocation must be in (0, 1], got {}",
                r.max_single_allocation
            ));
        }
        if r.min_diversification > Strategy::all().len() {
            error(format!(
                "rebalance.min_diversification must be at most {}, got {}",
                Strategy::all().len(),
                r.min_diversification
            ));
        }
        if r.min_change_bps >= 10_000 {
            error(format!(
                "rebalance.min_change_bps must be below 10000, got {}",
                r.min_change_bps
            ));
        }
        if r.rl.max_temperature <= 0.0 {
            error(format!(
                "rebalance.rl.max_temperature must be positive, got {}",
                r.rl.max_temperature
            ));
        }
        if r.bandit.floor_weight < 0.0 {
            error(format!(
                "rebalance.bandit.floor_weight must be non-negative, got {}",
                r.bandit.floor_weight
            ));
        }

        // Non-fatal: values that get clamped at runtime
        let arms = Strategy::all().len() as f64;
        if r.bandit.floor_weight * arms > 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "rebalance.bandit.floor_weight={} cannot hold for {} strategies; it will be capped",
                    r.bandit.floor_weight, arms
                ),
            });
        }
        if r.max_single_allocation > 0.0 && r.max_single_allocation * arms < 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "rebalance.max_single_allocation={} is infeasible for {} strategies; it will be raised",
                    r.max_single_allocation, arms
                ),
            });
        }
        if self.gateway.base_url.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "gateway.base_url is not set; signals must be supplied per request"
                    .to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
