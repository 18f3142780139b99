use crate::gateway::ChainGateway;
use autopilot_core::config::Config;
use autopilot_core::orchestrator::Orchestrator;
use autopilot_core::rebalance::Rebalancer;
use autopilot_core::risk::RiskScorer;
use autopilot_core::schedule::SchedulePlanner;
use autopilot_core::signals::SignalCache;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub cache: Arc<SignalCache>,
    /// Unset when `gateway.base_url` is not configured.
    pub gateway: Option<Arc<ChainGateway>>,
}

impl AppState {
    pub fn new(config: Config) -> autopilot_core::Result<Self> {
        let gateway = ChainGateway::from_config(&config.gateway)?.map(Arc::new);
        let scorer = RiskScorer::new(config.risk.clone());
        let planner = SchedulePlanner::new(config.schedule.clone(), scorer);
        let rebalancer = Rebalancer::new(config.rebalance.clone());
        Ok(Self {
            orchestrator: Arc::new(Orchestrator::new(planner, rebalancer)),
            cache: Arc::new(SignalCache::new()),
            gateway,
            config: Arc::new(config),
        })
    }

    pub fn scorer(&self) -> &RiskScorer {
        self.orchestrator.planner().scorer()
    }

    pub fn planner(&self) -> &SchedulePlanner {
        self.orchestrator.planner()
    }

    pub fn rebalancer(&self) -> &Rebalancer {
        self.orchestrator.rebalancer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_without_gateway() {
        let state = AppState::new(Config::default()).unwrap();
        assert!(state.gateway.is_none());
        assert!(state.cache.snapshot().is_none());
        assert_eq!(state.scorer().config().weights.amount, 0.5);
    }

    #[test]
    fn new_state_builds_gateway_from_config() {
        let mut config = Config::default();
        config.gateway.base_url = Some("http://gateway.local:9000/".to_string());
        let state = AppState::new(config).unwrap();
        assert_eq!(
            state.gateway.as_ref().unwrap().base_url(),
            "http://gateway.local:9000"
        );
    }
}
