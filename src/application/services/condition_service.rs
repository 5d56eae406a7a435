//! Condition service - decides choice visibility against the current state
//!
//! Every clause is ANDed and evaluation short-circuits on the first failure.
//! Absent clauses are trivially satisfied. Module conditions are fail-closed:
//! a module that is not live for this episode makes the whole condition
//! false, and unknown condition names are false inside the modules
//! themselves.

use std::collections::{BTreeSet, HashMap};

use crate::domain::entities::Choice;
use crate::domain::modules::ModuleRegistry;
use crate::domain::value_objects::{
    Condition, GameState, ModuleId, Scalar, VariableConstraint,
};

/// Whether a choice should be shown right now. Recomputed on every display,
/// never cached.
pub fn is_choice_available(
    choice: &Choice,
    game_state: &GameState,
    modules: &ModuleRegistry,
    active_modules: &BTreeSet<ModuleId>,
) -> bool {
    match &choice.condition {
        None => true,
        Some(condition) => evaluate(condition, game_state, modules, active_modules),
    }
}

pub fn evaluate(
    condition: &Condition,
    game_state: &GameState,
    modules: &ModuleRegistry,
    active_modules: &BTreeSet<ModuleId>,
) -> bool {
    if !flags_match(&condition.flags, &game_state.flags) {
        return false;
    }
    if !variables_match(&condition.variables, &game_state.variables) {
        return false;
    }
    condition.module_conditions.iter().all(|module_condition| {
        if !active_modules.contains(&module_condition.module) {
            return false;
        }
        modules
            .get(&module_condition.module)
            .map(|module| {
                module.check_condition(
                    &module_condition.condition,
                    module_condition.params.as_ref(),
                )
            })
            .unwrap_or(false)
    })
}

/// A flag that was never set satisfies neither an expected `true` nor an
/// expected `false`.
pub fn flags_match(expected: &HashMap<String, bool>, flags: &HashMap<String, bool>) -> bool {
    expected
        .iter()
        .all(|(flag, want)| flags.get(flag) == Some(want))
}

pub fn variables_match(
    constraints: &HashMap<String, VariableConstraint>,
    variables: &HashMap<String, Scalar>,
) -> bool {
    constraints.iter().all(|(name, constraint)| {
        let current = variables.get(name);
        match constraint {
            VariableConstraint::Range(range) => range.holds(current),
            VariableConstraint::Equals(expected) => current == Some(expected),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::modules::GameModule;
    use crate::domain::value_objects::{ModuleCondition, NumericRange, SceneId};
    use serde_json::json;

    fn choice_with(condition: Option<Condition>) -> Choice {
        Choice {
            text: "Proceed".to_string(),
            next_scene: SceneId::from("next"),
            set_flags: HashMap::new(),
            set_variables: HashMap::new(),
            module_actions: Vec::new(),
            condition,
        }
    }

    fn live_ship() -> (ModuleRegistry, BTreeSet<ModuleId>) {
        let mut modules = ModuleRegistry::standard();
        let ship = ModuleId::from("ship");
        modules
            .initialize_modules(std::slice::from_ref(&ship), &HashMap::new())
            .unwrap();
        (modules, BTreeSet::from([ship]))
    }

    #[test]
    fn absent_condition_is_always_available() {
        let (modules, active) = live_ship();
        assert!(is_choice_available(
            &choice_with(None),
            &GameState::default(),
            &modules,
            &active
        ));
    }

    #[test]
    fn unset_flag_fails_both_expected_values() {
        let expected_true = HashMap::from([("visited".to_string(), true)]);
        let expected_false = HashMap::from([("visited".to_string(), false)]);
        let flags = HashMap::new();
        assert!(!flags_match(&expected_true, &flags));
        assert!(!flags_match(&expected_false, &flags));
    }

    #[test]
    fn scalar_equality_does_not_coerce_types() {
        let constraints = HashMap::from([(
            "count".to_string(),
            VariableConstraint::Equals(Scalar::Number(3.0)),
        )]);
        let as_number = HashMap::from([("count".to_string(), Scalar::Number(3.0))]);
        let as_text = HashMap::from([("count".to_string(), Scalar::Text("3".to_string()))]);
        assert!(variables_match(&constraints, &as_number));
        assert!(!variables_match(&constraints, &as_text));
    }

    #[test]
    fn range_constraint_gates_on_current_value() {
        let condition = Condition {
            variables: HashMap::from([(
                "reputation".to_string(),
                VariableConstraint::Range(NumericRange {
                    gte: Some(10.0),
                    ..Default::default()
                }),
            )]),
            ..Default::default()
        };
        let (modules, active) = live_ship();

        let mut game_state = GameState::default();
        game_state
            .variables
            .insert("reputation".to_string(), Scalar::Number(12.0));
        assert!(evaluate(&condition, &game_state, &modules, &active));

        game_state
            .variables
            .insert("reputation".to_string(), Scalar::Number(9.0));
        assert!(!evaluate(&condition, &game_state, &modules, &active));
    }

    #[test]
    fn module_condition_fails_closed_when_module_not_live() {
        let condition = Condition {
            module_conditions: vec![ModuleCondition {
                module: ModuleId::from("crew"),
                condition: "CREW_AVAILABLE".to_string(),
                params: Some(json!({"crewId": "picard"})),
            }],
            ..Default::default()
        };
        // Crew exists in the registry but is not live for this episode.
        let (modules, active) = live_ship();
        assert!(!evaluate(&condition, &GameState::default(), &modules, &active));
    }

    #[test]
    fn module_condition_consults_the_live_module() {
        let condition = Condition {
            module_conditions: vec![ModuleCondition {
                module: ModuleId::from("ship"),
                condition: "SHIELDS_UP".to_string(),
                params: None,
            }],
            ..Default::default()
        };
        let (mut modules, active) = live_ship();
        assert!(evaluate(&condition, &GameState::default(), &modules, &active));

        modules
            .get_mut(&ModuleId::from("ship"))
            .unwrap()
            .handle_action("LOWER_SHIELDS", None)
            .unwrap();
        assert!(!evaluate(&condition, &GameState::default(), &modules, &active));
    }

    #[test]
    fn all_clauses_are_anded() {
        let condition = Condition {
            flags: HashMap::from([("cleared".to_string(), true)]),
            variables: HashMap::from([(
                "fuel".to_string(),
                VariableConstraint::Range(NumericRange {
                    gt: Some(0.0),
                    ..Default::default()
                }),
            )]),
            ..Default::default()
        };
        let (modules, active) = live_ship();

        let mut game_state = GameState::default();
        game_state.flags.insert("cleared".to_string(), true);
        game_state
            .variables
            .insert("fuel".to_string(), Scalar::Number(5.0));
        assert!(evaluate(&condition, &game_state, &modules, &active));

        game_state.flags.insert("cleared".to_string(), false);
        assert!(!evaluate(&condition, &game_state, &modules, &active));
    }
}
