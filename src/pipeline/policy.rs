//! The routing policy: a pure decision function over the pipeline state.
//!
//! Centralizing routing keeps stages oblivious to each other; a stage only
//! mutates the state, and the policy alone decides what runs next. The rules
//! are ordered, first match wins.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::state::PipelineState;

/// The routing targets, named after the stage they dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Profile stage: fetch and normalize the user's health profile.
    UserAgent,
    /// Evaluation stage: thresholds plus allergen inference.
    ChatAgent,
    /// Retrieval stage: candidate search for substitutes.
    RecoAgent,
    /// Scoring stage: rank candidates per condition.
    SubRecoAgent,
    /// Composer stage: produce the final answer.
    RespAgent,
    /// Terminal.
    End,
}

impl fmt::Display for NextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NextStep::UserAgent => "user_agent",
            NextStep::ChatAgent => "chat_agent",
            NextStep::RecoAgent => "reco_agent",
            NextStep::SubRecoAgent => "sub_reco_agent",
            NextStep::RespAgent => "resp_agent",
            NextStep::End => "end",
        };
        write!(f, "{name}")
    }
}

/// Ordered routing rules over the accumulated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingPolicy;

impl RoutingPolicy {
    pub fn new() -> Self {
        RoutingPolicy
    }

    /// Decide the next stage. Reads the state, never writes it.
    ///
    /// Rules, first match wins:
    /// 1. any condition flag still unset -> profile stage
    /// 2. a threshold exceedance or an allergen detected -> retrieval
    /// 3. at least one active condition -> evaluation
    /// 4. otherwise -> terminal
    pub fn decide(&self, state: &PipelineState) -> NextStep {
        let step = if state.flags.any_unset() {
            NextStep::UserAgent
        } else if state.any_exceed() || state.any_allergen() {
            NextStep::RecoAgent
        } else if state.flags.active_count() >= 1 {
            NextStep::ChatAgent
        } else {
            NextStep::End
        };
        debug!(
            "routing user={} product={} exceed={} allergen={} active={} -> {step}",
            state.user_id,
            state.product_id,
            state.any_exceed(),
            state.any_allergen(),
            state.flags.active_count(),
        );
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{DiseaseFlags, RawHealthProfile};
    use crate::threshold::ThresholdEvaluation;
    use serde_json::json;

    fn flags(value: serde_json::Value) -> DiseaseFlags {
        let raw: RawHealthProfile = serde_json::from_value(value).unwrap();
        DiseaseFlags::from_raw(&raw)
    }

    fn all_clear() -> DiseaseFlags {
        flags(json!({
            "diabetes": 0, "hypertension": 0, "kidneydisease": 0, "allergy": 0,
        }))
    }

    #[test]
    fn test_unset_flags_route_to_profile_stage() {
        let state = PipelineState::new("u-1", 1);
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::UserAgent);
    }

    #[test]
    fn test_danger_routes_to_retrieval() {
        let mut state = PipelineState::new("u-1", 1);
        state.flags = flags(json!({
            "diabetes": 1, "hypertension": 0, "kidneydisease": 0, "allergy": 0,
        }));
        state.evaluation = Some(ThresholdEvaluation {
            any_exceed: true,
            exceeded_nutrients: vec!["sugar".into()],
        });
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::RecoAgent);
    }

    #[test]
    fn test_allergen_alone_routes_to_retrieval() {
        let mut state = PipelineState::new("u-1", 1);
        state.flags = all_clear();
        state.allergen.any_allergen = true;
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::RecoAgent);
    }

    #[test]
    fn test_active_condition_routes_to_evaluation() {
        let mut state = PipelineState::new("u-1", 1);
        state.flags = flags(json!({
            "diabetes": 0, "hypertension": 1, "kidneydisease": 0, "allergy": 0,
        }));
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::ChatAgent);
    }

    #[test]
    fn test_no_condition_terminates() {
        let mut state = PipelineState::new("u-1", 1);
        state.flags = all_clear();
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::End);
    }

    #[test]
    fn test_danger_outranks_evaluation_rerun() {
        // An active condition with a recorded exceedance must go to
        // retrieval, not back into evaluation.
        let mut state = PipelineState::new("u-1", 1);
        state.flags = flags(json!({
            "diabetes": 1, "hypertension": 1, "kidneydisease": 0, "allergy": 0,
        }));
        state.evaluation = Some(ThresholdEvaluation {
            any_exceed: true,
            exceeded_nutrients: vec!["sodium".into()],
        });
        assert_eq!(RoutingPolicy::new().decide(&state), NextStep::RecoAgent);
    }

    #[test]
    fn test_step_serialization_names() {
        let json = serde_json::to_string(&NextStep::SubRecoAgent).unwrap();
        assert_eq!(json, r#""sub_reco_agent""#);
        assert_eq!(NextStep::End.to_string(), "end");
    }
}
