use crate::error::AutopilotError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Transfer,
    Harvest,
    Rebalance,
    Deposit,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Transfer,
            ActionKind::Harvest,
            ActionKind::Rebalance,
            ActionKind::Deposit,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Transfer => "transfer",
            ActionKind::Harvest => "harvest",
            ActionKind::Rebalance => "rebalance",
            ActionKind::Deposit => "deposit",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(ActionKind::Transfer),
            "harvest" => Ok(ActionKind::Harvest),
            "rebalance" => Ok(ActionKind::Rebalance),
            "deposit" => Ok(ActionKind::Deposit),
            _ => Err(AutopilotError::invalid(format!("unknown action '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Urgency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            _ => Err(AutopilotError::invalid(format!(
                "invalid urgency '{s}': expected low, normal or high"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A yield strategy a vault can allocate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    Staking,
    Lending,
    #[serde(rename = "LP")]
    Lp,
    PerpsHedge,
}

impl Strategy {
    pub fn all() -> &'static [Strategy] {
        &[
            Strategy::Staking,
            Strategy::Lending,
            Strategy::Lp,
            Strategy::PerpsHedge,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Staking => "Staking",
            Strategy::Lending => "Lending",
            Strategy::Lp => "LP",
            Strategy::PerpsHedge => "PerpsHedge",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Staking" | "staking" => Ok(Strategy::Staking),
            "Lending" | "lending" => Ok(Strategy::Lending),
            "LP" | "lp" => Ok(Strategy::Lp),
            "PerpsHedge" | "perps_hedge" | "perps-hedge" => Ok(Strategy::PerpsHedge),
            _ => Err(AutopilotError::invalid(format!("unknown strategy '{s}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// An amount of a single denom in integer base units (e.g. `usei`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "numeric::int_or_string")]
    pub amount: i128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: i128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

// ---------------------------------------------------------------------------
// BehaviorContext
// ---------------------------------------------------------------------------

/// Caller-owned behavioral counters for the actor, read as a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorContext {
    #[serde(default, with = "numeric::float_or_string")]
    pub tx_per_hour: f64,
    #[serde(default, with = "numeric::float_or_string")]
    pub tx_per_day: f64,
    /// Historical median transfer amount for the actor, in the request's denom.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "numeric::opt_int_or_string"
    )]
    pub median_amount: Option<i128>,
    #[serde(default)]
    pub first_time_counterparty: bool,
}

// ---------------------------------------------------------------------------
// ActionRequest
// ---------------------------------------------------------------------------

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default = "new_request_id")]
    pub id: String,
    #[serde(default)]
    pub actor: String,
    pub action: ActionKind,
    /// Absent for actions that move no caller funds (harvest, rebalance).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Coin>,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub context: BehaviorContext,
}

impl ActionRequest {
    pub fn new(action: ActionKind, target_id: impl Into<String>) -> Self {
        Self {
            id: new_request_id(),
            actor: String::new(),
            action,
            amount: None,
            target_id: target_id.into(),
            counterparty: None,
            context: BehaviorContext::default(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_amount(mut self, coin: Coin) -> Self {
        self.amount = Some(coin);
        self
    }

    pub fn with_context(mut self, context: BehaviorContext) -> Self {
        self.context = context;
        self
    }
}

// ---------------------------------------------------------------------------
// Lenient numeric (de)serialization
// ---------------------------------------------------------------------------

/// Counters and amounts arrive either as JSON numbers or as numeric strings.
pub(crate) mod numeric {
    use serde::de::{self, Visitor};
    use std::fmt;

    struct IntVisitor;

    impl<'de> Visitor<'de> for IntVisitor {
        type Value = i128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a string containing an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<i128, E> {
            Ok(v)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<i128, E> {
            i128::try_from(v).map_err(|_| E::custom("integer out of range"))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i128, E> {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i128)
            } else {
                Err(E::custom(format!("expected an integer amount, got {v}")))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i128, E> {
            v.trim()
                .parse::<i128>()
                .map_err(|_| E::custom(format!("invalid integer '{v}'")))
        }
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or a string containing a number")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid number '{v}'")))
        }
    }

    pub mod int_or_string {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(v: &i128, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&v.to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
            d.deserialize_any(super::IntVisitor)
        }
    }

    pub mod opt_int_or_string {
        use serde::{Deserialize, Deserializer, Serializer};

        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::int_or_string")] i128);

        pub fn serialize<S: Serializer>(v: &Option<i128>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(n) => s.serialize_str(&n.to_string()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i128>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(d)?.map(|w| w.0))
        }
    }

    pub mod float_or_string {
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_f64(*v)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
            d.deserialize_any(super::FloatVisitor)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
