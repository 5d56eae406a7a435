//! Effect service - cross-module effect propagation
//!
//! Effects run in the order given; each dispatch writes its state delta into
//! the shared in-flight map before the next effect runs, and any nested
//! effects a dispatch produces resolve depth-first, before the next sibling.
//! An explicit depth counter bounds runaway feedback loops between modules.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::domain::modules::ModuleRegistry;
use crate::domain::value_objects::{Alert, CrossModuleEffect, ModuleId};

/// Chain reactions deeper than this are cut off with a diagnostic alert.
pub const MAX_PROPAGATION_DEPTH: usize = 8;

/// One dispatched effect, for the interaction history.
#[derive(Debug, Clone)]
pub struct ModuleInteraction {
    pub module: ModuleId,
    pub action: String,
    /// Whether the module recognized the action at all.
    pub handled: bool,
    pub alert: Option<Alert>,
}

#[derive(Debug, Default)]
pub struct PropagationOutcome {
    /// Alerts in dispatch order; the UI shows the last one and keeps the
    /// rest in history.
    pub alerts: Vec<Alert>,
    pub interactions: Vec<ModuleInteraction>,
}

pub struct EffectPropagator {
    max_depth: usize,
}

impl Default for EffectPropagator {
    fn default() -> Self {
        Self {
            max_depth: MAX_PROPAGATION_DEPTH,
        }
    }
}

impl EffectPropagator {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Dispatch `effects` against the live modules, folding state deltas into
    /// `module_states`. State already applied is kept even when a chain is
    /// cut off by the depth guard.
    pub fn propagate(
        &self,
        effects: &[CrossModuleEffect],
        modules: &mut ModuleRegistry,
        active_modules: &BTreeSet<ModuleId>,
        module_states: &mut HashMap<ModuleId, Value>,
    ) -> PropagationOutcome {
        let mut outcome = PropagationOutcome::default();
        self.propagate_at(effects, 0, modules, active_modules, module_states, &mut outcome);
        outcome
    }

    fn propagate_at(
        &self,
        effects: &[CrossModuleEffect],
        depth: usize,
        modules: &mut ModuleRegistry,
        active_modules: &BTreeSet<ModuleId>,
        module_states: &mut HashMap<ModuleId, Value>,
        outcome: &mut PropagationOutcome,
    ) {
        if depth >= self.max_depth {
            tracing::warn!(depth, "cross-module effect chain exceeded depth limit");
            outcome.alerts.push(Alert::danger(
                "Cascading system interactions exceeded safe limits. Further effects suppressed.",
            ));
            return;
        }

        for effect in effects {
            // Content may reference modules defensively; targets that are not
            // live for this episode are skipped without complaint.
            if !active_modules.contains(&effect.module_id) {
                tracing::debug!(module = %effect.module_id, action = %effect.action,
                    "skipping effect for inactive module");
                continue;
            }
            let Some(module) = modules.get_mut(&effect.module_id) else {
                continue;
            };

            match module.handle_action(&effect.action, effect.payload.as_ref()) {
                None => {
                    outcome.interactions.push(ModuleInteraction {
                        module: effect.module_id.clone(),
                        action: effect.action.clone(),
                        handled: false,
                        alert: None,
                    });
                }
                Some(result) => {
                    if let Some(state) = result.state {
                        module_states.insert(effect.module_id.clone(), state);
                    }
                    if let Some(alert) = &result.alert {
                        outcome.alerts.push(alert.clone());
                    }
                    outcome.interactions.push(ModuleInteraction {
                        module: effect.module_id.clone(),
                        action: effect.action.clone(),
                        handled: true,
                        alert: result.alert,
                    });

                    // Depth-first: the chain reaction fully resolves before
                    // the next sibling effect runs.
                    if !result.cross_module_effects.is_empty() {
                        self.propagate_at(
                            &result.cross_module_effects,
                            depth + 1,
                            modules,
                            active_modules,
                            module_states,
                            outcome,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::modules::GameModule;
    use crate::domain::value_objects::ModuleActionResult;
    use anyhow::Result;
    use serde_json::json;

    /// Test module that forwards every PING back at itself, forever.
    struct EchoModule {
        id: &'static str,
        state: Option<Value>,
        dispatched: u64,
    }

    impl EchoModule {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                state: None,
                dispatched: 0,
            }
        }
    }

    impl GameModule for EchoModule {
        fn id(&self) -> ModuleId {
            ModuleId::from(self.id)
        }

        fn name(&self) -> &'static str {
            "Echo"
        }

        fn description(&self) -> &'static str {
            "Echoes every action back at itself"
        }

        fn initialize(&mut self, _config: Option<&Value>) -> Result<Value> {
            let state = json!({"dispatched": 0});
            self.state = Some(state.clone());
            self.dispatched = 0;
            Ok(state)
        }

        fn state(&self) -> Option<Value> {
            self.state.clone()
        }

        fn set_state(&mut self, state: Value) -> Result<()> {
            self.state = Some(state);
            Ok(())
        }

        fn handle_action(
            &mut self,
            action: &str,
            _payload: Option<&Value>,
        ) -> Option<ModuleActionResult> {
            if action != "PING" {
                return None;
            }
            self.dispatched += 1;
            let state = json!({"dispatched": self.dispatched});
            self.state = Some(state.clone());
            Some(ModuleActionResult {
                state: Some(state),
                alert: None,
                cross_module_effects: vec![CrossModuleEffect {
                    module_id: ModuleId::from(self.id),
                    action: "PING".to_string(),
                    payload: None,
                }],
            })
        }

        fn check_condition(&self, _condition: &str, _params: Option<&Value>) -> bool {
            false
        }
    }

    fn standard_live(ids: &[&str]) -> (ModuleRegistry, BTreeSet<ModuleId>, HashMap<ModuleId, Value>) {
        let mut modules = ModuleRegistry::standard();
        let required: Vec<ModuleId> = ids.iter().map(|id| ModuleId::from(*id)).collect();
        let states = modules
            .initialize_modules(&required, &HashMap::new())
            .unwrap();
        (modules, required.into_iter().collect(), states)
    }

    #[test]
    fn nested_effects_resolve_before_siblings() {
        let (mut modules, active, mut states) = standard_live(&["ship", "crew", "mission"]);

        // Life-support damage cascades into crew morale; the morale hit and
        // its own consequences must land before the second sibling effect.
        let effects = vec![
            CrossModuleEffect::new(
                "ship",
                "TAKE_DAMAGE",
                json!({"system": "lifeSupportSystems", "amount": 90}),
            ),
            CrossModuleEffect::new("mission", "ADD_LOG_ENTRY", json!({"text": "sibling"})),
        ];

        let outcome = EffectPropagator::default().propagate(
            &effects,
            &mut modules,
            &active,
            &mut states,
        );

        let order: Vec<(&str, &str)> = outcome
            .interactions
            .iter()
            .map(|i| (i.module.as_str(), i.action.as_str()))
            .collect();
        let crew_position = order
            .iter()
            .position(|(module, _)| *module == "crew")
            .expect("crew dispatched");
        let sibling_position = order
            .iter()
            .position(|(_, action)| *action == "ADD_LOG_ENTRY")
            .expect("sibling dispatched");
        assert!(crew_position < sibling_position, "depth-first order violated: {order:?}");

        // The crew morale delta is visible in the folded state map.
        let crew_state = states.get(&ModuleId::from("crew")).unwrap();
        let picard_morale = crew_state["officers"]
            .as_array()
            .unwrap()
            .iter()
            .find(|member| member["id"] == "picard")
            .unwrap()["morale"]
            .as_i64()
            .unwrap();
        assert_eq!(picard_morale, 75);
    }

    #[test]
    fn unknown_and_inactive_targets_are_skipped_silently() {
        let (mut modules, active, mut states) = standard_live(&["ship"]);
        let effects = vec![
            CrossModuleEffect::new("crew", "BOOST_MORALE", json!({"amount": 5})),
            CrossModuleEffect::new("holodeck", "RUN_PROGRAM", json!({})),
        ];
        let outcome = EffectPropagator::default().propagate(
            &effects,
            &mut modules,
            &active,
            &mut states,
        );
        assert!(outcome.interactions.is_empty());
        assert!(outcome.alerts.is_empty());
    }

    #[test]
    fn unrecognized_action_is_recorded_as_unhandled() {
        let (mut modules, active, _initial) = standard_live(&["crew"]);
        let mut states = HashMap::new();
        let effects = vec![CrossModuleEffect::new(
            "crew",
            "NOTIFY_EQUIPMENT_ASSIGNMENT",
            json!({"crewId": "worf"}),
        )];
        let outcome = EffectPropagator::default().propagate(
            &effects,
            &mut modules,
            &active,
            &mut states,
        );
        assert_eq!(outcome.interactions.len(), 1);
        assert!(!outcome.interactions[0].handled);
        assert!(states.is_empty());
    }

    #[test]
    fn depth_guard_stops_feedback_loops_and_keeps_applied_state() {
        // A module that pings itself forever would recurse unbounded without
        // the guard.
        let mut echo = EchoModule::new("echo");
        echo.initialize(None).unwrap();
        let echo_id = echo.id();
        let mut states = HashMap::from([(echo_id.clone(), echo.state().unwrap())]);

        let mut modules = ModuleRegistry::standard();
        modules.register(Box::new(echo));
        let active = BTreeSet::from([echo_id.clone()]);
        let effects = vec![CrossModuleEffect {
            module_id: echo_id.clone(),
            action: "PING".to_string(),
            payload: None,
        }];

        let outcome = EffectPropagator::default().propagate(
            &effects,
            &mut modules,
            &active,
            &mut states,
        );

        // Guard fired exactly once with a diagnostic alert.
        assert_eq!(outcome.alerts.len(), 1);
        assert!(outcome.alerts[0].message.contains("exceeded safe limits"));
        // Every dispatch up to the limit went through and its state stuck.
        assert_eq!(outcome.interactions.len(), MAX_PROPAGATION_DEPTH);
        assert_eq!(
            states.get(&echo_id).unwrap()["dispatched"],
            json!(MAX_PROPAGATION_DEPTH)
        );
    }
}
