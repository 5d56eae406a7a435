//! Ship systems module - power grid, damage control, weapons, navigation

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::modules::{
    clamp_percent, decode_state, merge_config, parse_payload, snapshot, GameModule,
};
use crate::domain::value_objects::{Alert, CrossModuleEffect, ModuleActionResult, ModuleId};

const MODULE_ID: &str = "ship";

/// Operational status of a single ship system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Online,
    Offline,
    Damaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    None,
    Yellow,
    Red,
    Blue,
}

impl AlertLevel {
    fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Yellow => "yellow",
            AlertLevel::Red => "red",
            AlertLevel::Blue => "blue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarpCoreStatus {
    Online,
    Offline,
    Ejected,
    Breach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipState {
    pub name: String,
    pub registry: String,
    pub class: String,
    pub systems: ShipSystems,
    pub power: PowerGrid,
    /// Integrity per system, 0 destroyed .. 100 pristine.
    pub damage: BTreeMap<String, i64>,
    pub position: Position,
    pub alerts: AlertBoard,
}

impl Default for ShipState {
    fn default() -> Self {
        let damage = [
            "hull",
            "warpDrive",
            "impulse",
            "shields",
            "phasers",
            "torpedoes",
            "lifeSupportSystems",
            "sensors",
            "transporters",
            "computerCore",
        ]
        .into_iter()
        .map(|system| (system.to_string(), 100))
        .collect();

        Self {
            name: "USS Enterprise".to_string(),
            registry: "NCC-1701-D".to_string(),
            class: "Galaxy".to_string(),
            systems: ShipSystems::default(),
            power: PowerGrid::default(),
            damage,
            position: Position::default(),
            alerts: AlertBoard::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipSystems {
    pub warp_drive: WarpDrive,
    pub impulse: Impulse,
    pub shields: Shields,
    pub weapons: Weapons,
    pub life_support_systems: LifeSupport,
    pub sensors: Sensors,
    pub transporters: Transporters,
    pub computer_core: ComputerCore,
}

impl Default for ShipSystems {
    fn default() -> Self {
        Self {
            warp_drive: WarpDrive::default(),
            impulse: Impulse::default(),
            shields: Shields::default(),
            weapons: Weapons::default(),
            life_support_systems: LifeSupport::default(),
            sensors: Sensors::default(),
            transporters: Transporters::default(),
            computer_core: ComputerCore::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarpDrive {
    pub status: SystemStatus,
    pub max_warp: u32,
    pub current_warp: u32,
    pub efficiency: i64,
}

impl Default for WarpDrive {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            max_warp: 9,
            current_warp: 0,
            efficiency: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Impulse {
    pub status: SystemStatus,
    pub power: i64,
}

impl Default for Impulse {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            power: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shields {
    pub status: SystemStatus,
    pub strength: i64,
    pub modulation: f64,
    pub harmonics: String,
}

impl Default for Shields {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            strength: 100,
            modulation: 147.28,
            harmonics: "Alpha".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weapons {
    pub phasers: Phasers,
    pub torpedoes: Torpedoes,
}

impl Default for Weapons {
    fn default() -> Self {
        Self {
            phasers: Phasers::default(),
            torpedoes: Torpedoes::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Phasers {
    pub status: SystemStatus,
    pub power: i64,
    pub frequency: f64,
    pub banks: u32,
}

impl Default for Phasers {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            power: 100,
            frequency: 1.02,
            banks: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Torpedoes {
    pub status: SystemStatus,
    pub count: u32,
    pub types: Vec<TorpedoStock>,
}

impl Default for Torpedoes {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            count: 250,
            types: vec![
                TorpedoStock {
                    name: "Photon".to_string(),
                    count: 200,
                },
                TorpedoStock {
                    name: "Quantum".to_string(),
                    count: 50,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorpedoStock {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifeSupport {
    pub status: SystemStatus,
    pub efficiency: i64,
}

impl Default for LifeSupport {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            efficiency: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sensors {
    pub status: SystemStatus,
    pub range: i64,
    pub resolution: i64,
}

impl Default for Sensors {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            range: 100,
            resolution: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transporters {
    pub status: SystemStatus,
    pub range: i64,
    pub buffer_capacity: u32,
}

impl Default for Transporters {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            range: 40_000,
            buffer_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputerCore {
    pub status: SystemStatus,
    pub processing_power: i64,
    pub data_storage: i64,
}

impl Default for ComputerCore {
    fn default() -> Self {
        Self {
            status: SystemStatus::Online,
            processing_power: 100,
            data_storage: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerGrid {
    pub total: i64,
    pub available: i64,
    pub allocated: BTreeMap<String, i64>,
    pub emergency_reserves: i64,
    pub warp_core: WarpCore,
}

impl PowerGrid {
    /// Derived field: whatever the allocations leave over, floored at zero.
    pub fn recalculate_available(&mut self) {
        let allocated: i64 = self.allocated.values().sum();
        self.available = (self.total - allocated).max(0);
    }

    fn allocation(&self, system: &str) -> i64 {
        self.allocated.get(system).copied().unwrap_or(0)
    }

    fn set_allocation(&mut self, system: &str, amount: i64) {
        self.allocated.insert(system.to_string(), amount.max(0));
    }
}

impl Default for PowerGrid {
    fn default() -> Self {
        let allocated = [
            ("warpDrive", 30),
            ("impulse", 10),
            ("shields", 20),
            ("weapons", 10),
            ("lifeSupportSystems", 5),
            ("sensors", 3),
            ("transporters", 2),
            ("computerCore", 0),
        ]
        .into_iter()
        .map(|(system, amount)| (system.to_string(), amount))
        .collect();

        Self {
            total: 100,
            available: 20,
            allocated,
            emergency_reserves: 100,
            warp_core: WarpCore::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarpCore {
    pub status: WarpCoreStatus,
    pub efficiency: i64,
    /// Millions of degrees Kelvin.
    pub temperature: f64,
    pub dilithium_crystals: DilithiumCrystals,
}

impl Default for WarpCore {
    fn default() -> Self {
        Self {
            status: WarpCoreStatus::Online,
            efficiency: 100,
            temperature: 3.2,
            dilithium_crystals: DilithiumCrystals::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DilithiumCrystals {
    pub integrity: i64,
    pub alignment: i64,
}

impl Default for DilithiumCrystals {
    fn default() -> Self {
        Self {
            integrity: 100,
            alignment: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub sector: String,
    pub coordinates: [f64; 3],
    pub heading: Heading,
    pub speed: Speed,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            sector: "Alpha Quadrant".to_string(),
            coordinates: [0.0, 0.0, 0.0],
            heading: Heading::default(),
            speed: Speed::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Heading {
    pub yaw: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Speed {
    pub impulse: f64,
    pub warp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertBoard {
    pub current: AlertLevel,
    pub history: Vec<AlertRecord>,
}

impl Default for AlertBoard {
    fn default() -> Self {
        Self {
            current: AlertLevel::None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    #[serde(rename = "type")]
    pub kind: AlertLevel,
    pub timestamp: i64,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FirePayload {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DamagePayload {
    system: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllocatePayload {
    system: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct AlertPayload {
    status: AlertLevel,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionPayload {
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    coordinates: Option<[f64; 3]>,
    #[serde(default)]
    heading: Option<HeadingPatch>,
}

#[derive(Debug, Deserialize)]
struct HeadingPatch {
    #[serde(default)]
    yaw: Option<f64>,
    #[serde(default)]
    pitch: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ModulationPayload {
    frequency: f64,
    #[serde(default)]
    harmonics: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SystemParam {
    system: String,
    #[serde(default)]
    threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TorpedoParam {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectorParam {
    sector: String,
}

#[derive(Debug, Deserialize)]
struct AmountParam {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct AlertStatusParam {
    status: AlertLevel,
}

#[derive(Debug, Deserialize)]
struct ThresholdParam {
    threshold: i64,
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Manages ship systems, power, damage, and navigation.
pub struct ShipModule {
    state: Option<ShipState>,
}

impl ShipModule {
    pub fn new() -> Self {
        Self { state: None }
    }

    fn set_warp(
        state: &mut ShipState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(factor) = payload.and_then(Value::as_f64).filter(|f| *f >= 0.0) else {
            return;
        };
        let factor = factor as u32;
        if factor > state.systems.warp_drive.max_warp {
            return;
        }

        let previous = state.systems.warp_drive.current_warp;
        state.systems.warp_drive.current_warp = factor;
        state.position.speed.warp = factor;

        if factor > 0 {
            // Warp power draw follows a cubic curve, capped at 80 units.
            let power_needed = (30 + i64::from(factor).pow(3)).min(80);
            let on_hand = state.power.available + state.power.allocation("warpDrive");

            if on_hand < power_needed {
                let shortage = power_needed - on_hand;
                let weapons = state.power.allocation("weapons");
                if weapons >= shortage {
                    state.power.set_allocation("weapons", weapons - shortage);
                    *alert = Some(Alert::warning(
                        "Power diverted from weapons to warp drive. Weapon efficiency reduced.",
                    ));
                } else {
                    let shields = state.power.allocation("shields");
                    state.power.set_allocation("shields", shields - shortage);
                    state.systems.shields.strength =
                        (state.systems.shields.strength - 20).max(50);
                    *alert = Some(Alert::warning(format!(
                        "Power diverted from shields to warp drive. Shield strength reduced to {}%.",
                        state.systems.shields.strength
                    )));
                    effects.push(CrossModuleEffect::new(
                        "crew",
                        "BOOST_MORALE",
                        json!({"amount": -5, "reason": "Power systems strained"}),
                    ));
                }
            }

            state.power.set_allocation("warpDrive", power_needed);
            state.power.recalculate_available();

            if previous == 0 && alert.is_none() {
                *alert = Some(Alert::info(format!(
                    "Warp {factor} engaged. Estimated arrival time: {} hours.",
                    estimate_eta(factor)
                )));
            }
        } else if previous > 0 {
            *alert = Some(Alert::info(
                "Dropping out of warp. Returning to impulse power.",
            ));
            state.power.set_allocation("warpDrive", 10);
            state.power.recalculate_available();
        }

        // Sustained high warp stresses the engines.
        if factor > 8 {
            let mut rng = rand::thread_rng();
            let stress_chance = f64::from((factor - 8) * 15);
            if rng.gen_range(0.0..100.0) < stress_chance {
                let wear = rng.gen_range(1..=5);
                let integrity = state.damage.get("warpDrive").copied().unwrap_or(100);
                state
                    .damage
                    .insert("warpDrive".to_string(), clamp_percent(integrity - wear));

                if state.damage.get("warpDrive").copied().unwrap_or(100) < 70 {
                    state.systems.warp_drive.status = SystemStatus::Damaged;
                    *alert = Some(Alert::danger(
                        "Warning: Warp drive showing signs of stress. Recommend reducing speed.",
                    ));
                    effects.push(CrossModuleEffect::new(
                        "crew",
                        "ASSIGN_TASK",
                        json!({
                            "task": "Warp Drive Maintenance",
                            "department": "engineering",
                            "priority": "high",
                        }),
                    ));
                }
            }
        }
    }

    fn raise_shields(state: &mut ShipState, alert: &mut Option<Alert>) {
        if state.systems.shields.status == SystemStatus::Online {
            return;
        }
        state.systems.shields.status = SystemStatus::Online;

        let shields = state.power.allocation("shields");
        if shields < 20 {
            let additional = 20 - shields;
            if state.power.available >= additional {
                state.power.available -= additional;
                state.power.set_allocation("shields", 20);
            } else {
                let shortage = additional - state.power.available;
                state
                    .power
                    .set_allocation("shields", shields + state.power.available);
                state.power.available = 0;

                let sensors = state.power.allocation("sensors");
                if sensors >= shortage {
                    state.power.set_allocation("sensors", sensors - shortage);
                    *alert = Some(Alert::warning(
                        "Power diverted from sensors to shields. Sensor range reduced.",
                    ));
                } else {
                    let weapons = state.power.allocation("weapons");
                    state.power.set_allocation("weapons", weapons - shortage);
                    *alert = Some(Alert::warning(
                        "Power diverted from weapons to shields. Weapon efficiency reduced.",
                    ));
                }
            }
        }

        state.alerts.history.push(AlertRecord {
            kind: state.alerts.current,
            timestamp: now_millis(),
            reason: "Shields raised".to_string(),
        });

        if alert.is_none() {
            *alert = Some(Alert::info(format!(
                "Shields raised. Shield strength at {}%.",
                state.systems.shields.strength
            )));
        }
    }

    fn lower_shields(state: &mut ShipState, alert: &mut Option<Alert>) {
        if state.systems.shields.status != SystemStatus::Online {
            return;
        }
        state.systems.shields.status = SystemStatus::Offline;

        // Keep a trickle allocated for quick reactivation, release the rest.
        let freed = (state.power.allocation("shields") - 5).max(0);
        state.power.available += freed;
        state.power.set_allocation("shields", 5);

        state.alerts.history.push(AlertRecord {
            kind: state.alerts.current,
            timestamp: now_millis(),
            reason: "Shields lowered".to_string(),
        });

        *alert = Some(Alert::info(
            "Shields lowered. Power redistributed to available reserves.",
        ));
    }

    fn fire_phasers(state: &mut ShipState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        if state.systems.weapons.phasers.status != SystemStatus::Online {
            *alert = Some(Alert::danger(
                "Unable to fire phasers. Phaser banks are offline.",
            ));
            return;
        }
        if state.power.allocation("weapons") < 10 {
            *alert = Some(Alert::danger(
                "Insufficient power to weapons systems. Unable to fire phasers.",
            ));
            return;
        }

        let target = parse_payload::<FirePayload>(payload)
            .and_then(|p| p.target)
            .map(|t| format!(" at {t}"))
            .unwrap_or_default();
        *alert = Some(Alert::info(format!(
            "Firing phasers{target}. Frequency: {} TeraHz.",
            state.systems.weapons.phasers.frequency
        )));

        let mut rng = rand::thread_rng();
        if rng.gen_range(0.0..100.0) < 5.0 {
            let wear = rng.gen_range(1..=5);
            let integrity = state.damage.get("phasers").copied().unwrap_or(100);
            state
                .damage
                .insert("phasers".to_string(), clamp_percent(integrity - wear));
            if state.damage.get("phasers").copied().unwrap_or(100) < 70 {
                *alert = Some(Alert::warning(
                    "Phaser bank 3 overheating. Recommend reducing fire rate.",
                ));
            }
        }

        state.systems.weapons.phasers.power =
            (state.systems.weapons.phasers.power - 5).max(80);
    }

    fn fire_torpedoes(state: &mut ShipState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        if state.systems.weapons.torpedoes.status != SystemStatus::Online {
            *alert = Some(Alert::danger("Torpedo launchers offline. Unable to fire."));
            return;
        }
        if state.systems.weapons.torpedoes.count == 0 {
            *alert = Some(Alert::danger("No torpedoes remaining. Unable to fire."));
            return;
        }

        let payload = parse_payload::<FirePayload>(payload);
        let kind = payload
            .as_ref()
            .and_then(|p| p.kind.clone())
            .unwrap_or_else(|| "Photon".to_string());
        let target = payload
            .as_ref()
            .and_then(|p| p.target.clone())
            .map(|t| format!(" at {t}"))
            .unwrap_or_default();

        let Some(stock) = state
            .systems
            .weapons
            .torpedoes
            .types
            .iter_mut()
            .find(|stock| stock.name == kind)
            .filter(|stock| stock.count > 0)
        else {
            *alert = Some(Alert::danger(format!(
                "No {kind} torpedoes remaining. Unable to fire."
            )));
            return;
        };

        stock.count -= 1;
        let remaining = stock.count;
        state.systems.weapons.torpedoes.count =
            state.systems.weapons.torpedoes.count.saturating_sub(1);

        *alert = Some(Alert::info(format!(
            "{kind} torpedo fired{target}. {remaining} {kind} torpedoes remaining."
        )));
    }

    fn take_damage(
        state: &mut ShipState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<DamagePayload>(payload) else {
            return;
        };
        let Some(integrity) = state.damage.get(&payload.system).copied() else {
            return;
        };

        let mut rng = rand::thread_rng();
        let amount = payload.amount.unwrap_or_else(|| rng.gen_range(10..30));
        let integrity = clamp_percent(integrity - amount);
        state.damage.insert(payload.system.clone(), integrity);

        if integrity < 30 {
            match payload.system.as_str() {
                "warpDrive" => {
                    state.systems.warp_drive.status = SystemStatus::Damaged;
                    if state.systems.warp_drive.current_warp > 0 {
                        state.systems.warp_drive.current_warp = 0;
                        state.position.speed.warp = 0;
                        *alert = Some(Alert::danger(
                            "Warp drive critically damaged! Dropping to impulse power.",
                        ));
                        effects.push(CrossModuleEffect::new(
                            "crew",
                            "INJURE_CREW",
                            json!({
                                "department": "engineering",
                                "severity": "minor",
                                "count": rng.gen_range(1..=3),
                            }),
                        ));
                    }
                }
                "impulse" => {
                    state.systems.impulse.status = SystemStatus::Damaged;
                    state.systems.impulse.power = (state.systems.impulse.power - 30).max(30);
                }
                "shields" => {
                    state.systems.shields.status = SystemStatus::Damaged;
                    state.systems.shields.strength =
                        (state.systems.shields.strength - 40).max(20);
                    *alert = Some(Alert::danger(format!(
                        "Shields critically damaged! Shield strength at {}%.",
                        state.systems.shields.strength
                    )));
                }
                "phasers" => {
                    state.systems.weapons.phasers.status = SystemStatus::Damaged;
                    state.systems.weapons.phasers.power =
                        (state.systems.weapons.phasers.power - 40).max(30);
                }
                "torpedoes" => {
                    state.systems.weapons.torpedoes.status = SystemStatus::Damaged;
                }
                "lifeSupportSystems" => {
                    state.systems.life_support_systems.status = SystemStatus::Damaged;
                    state.systems.life_support_systems.efficiency =
                        (state.systems.life_support_systems.efficiency - 30).max(50);
                    effects.push(CrossModuleEffect::new(
                        "crew",
                        "BOOST_MORALE",
                        json!({"amount": -15, "reason": "Life support systems damaged"}),
                    ));
                    *alert = Some(Alert::danger(format!(
                        "Life support systems damaged! Efficiency at {}%.",
                        state.systems.life_support_systems.efficiency
                    )));
                }
                _ => {}
            }
        } else if integrity < 70 {
            match payload.system.as_str() {
                "shields" => {
                    state.systems.shields.strength =
                        (state.systems.shields.strength - 20).max(60);
                    *alert = Some(Alert::warning(format!(
                        "Shields damaged. Shield strength at {}%.",
                        state.systems.shields.strength
                    )));
                }
                "warpDrive" => {
                    state.systems.warp_drive.efficiency =
                        (state.systems.warp_drive.efficiency - 15).max(70);
                    *alert = Some(Alert::warning(format!(
                        "Warp drive damaged. Efficiency at {}%.",
                        state.systems.warp_drive.efficiency
                    )));
                }
                _ => {}
            }
        }

        if payload.system == "hull" && state.damage.get("hull").copied().unwrap_or(100) < 40 {
            *alert = Some(Alert::danger(
                "Warning: Hull integrity compromised. Possible hull breach detected.",
            ));
            effects.push(CrossModuleEffect::new(
                "crew",
                "EMERGENCY_STATIONS",
                json!({
                    "emergency": "hull breach",
                    "location": payload.location.unwrap_or_else(|| "unknown".to_string()),
                }),
            ));
        }
    }

    fn repair_system(
        state: &mut ShipState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<DamagePayload>(payload) else {
            return;
        };
        let Some(integrity) = state.damage.get(&payload.system).copied() else {
            return;
        };

        let amount = payload.amount.unwrap_or(10);
        let integrity = clamp_percent(integrity + amount);
        state.damage.insert(payload.system.clone(), integrity);

        if integrity >= 70 {
            match payload.system.as_str() {
                "warpDrive" => {
                    state.systems.warp_drive.status = SystemStatus::Online;
                    state.systems.warp_drive.efficiency =
                        clamp_percent(state.systems.warp_drive.efficiency + 15);
                    *alert = Some(Alert::success("Warp drive repaired and back online."));
                }
                "impulse" => {
                    state.systems.impulse.status = SystemStatus::Online;
                    *alert = Some(Alert::success("Impulse engines repaired and back online."));
                }
                "shields" => {
                    state.systems.shields.status = SystemStatus::Online;
                    state.systems.shields.strength =
                        clamp_percent(state.systems.shields.strength + 20);
                    *alert = Some(Alert::success(format!(
                        "Shields repaired. Shield strength at {}%.",
                        state.systems.shields.strength
                    )));
                }
                "phasers" => {
                    state.systems.weapons.phasers.status = SystemStatus::Online;
                    *alert = Some(Alert::success("Phaser banks repaired and back online."));
                }
                "torpedoes" => {
                    state.systems.weapons.torpedoes.status = SystemStatus::Online;
                    *alert = Some(Alert::success("Torpedo launchers repaired and back online."));
                }
                "lifeSupportSystems" => {
                    state.systems.life_support_systems.status = SystemStatus::Online;
                    state.systems.life_support_systems.efficiency = 100;
                    *alert = Some(Alert::success("Life support systems fully repaired."));
                    effects.push(CrossModuleEffect::new(
                        "crew",
                        "BOOST_MORALE",
                        json!({"amount": 10, "reason": "Life support systems restored"}),
                    ));
                }
                _ => {}
            }
        } else {
            *alert = Some(Alert::info(format!(
                "{} partially repaired. Integrity at {integrity}%.",
                capitalize(&payload.system)
            )));
        }
    }

    fn allocate_power(
        state: &mut ShipState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<AllocatePayload>(payload) else {
            return;
        };
        if payload.amount < 0 || !state.power.allocated.contains_key(&payload.system) {
            return;
        }

        let current = state.power.allocation(&payload.system);
        let change = payload.amount - current;

        if change > 0 {
            if state.power.available >= change {
                state.power.set_allocation(&payload.system, payload.amount);
                state.power.available -= change;
                *alert = Some(Alert::info(format!(
                    "Power allocation to {} increased to {}%.",
                    payload.system, payload.amount
                )));

                if payload.system == "shields"
                    && state.systems.shields.status == SystemStatus::Online
                {
                    state.systems.shields.strength =
                        clamp_percent(state.systems.shields.strength + change / 2);
                } else if payload.system == "sensors" {
                    state.systems.sensors.range = clamp_percent(70 + payload.amount / 3);
                }
            } else {
                *alert = Some(Alert::warning(format!(
                    "Insufficient power available. Cannot allocate requested power to {}.",
                    payload.system
                )));
            }
        } else if change < 0 {
            state.power.set_allocation(&payload.system, payload.amount);
            state.power.available += change.abs();
            *alert = Some(Alert::info(format!(
                "Power allocation to {} reduced to {}%.",
                payload.system, payload.amount
            )));

            if payload.system == "shields" && state.systems.shields.status == SystemStatus::Online
            {
                state.systems.shields.strength =
                    (state.systems.shields.strength + change / 2).max(50);
            } else if payload.system == "lifeSupportSystems" && payload.amount < 5 {
                *alert = Some(Alert::danger(
                    "Warning: Life support systems at critical power levels.",
                ));
                effects.push(CrossModuleEffect::new(
                    "crew",
                    "BOOST_MORALE",
                    json!({"amount": -10, "reason": "Life support power critically low"}),
                ));
            }
        }
    }

    fn set_alert_status(
        state: &mut ShipState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<AlertPayload>(payload) else {
            return;
        };
        let previous = state.alerts.current;
        state.alerts.current = payload.status;
        state.alerts.history.push(AlertRecord {
            kind: payload.status,
            timestamp: now_millis(),
            reason: payload.reason.clone().unwrap_or_else(|| {
                format!("Alert status changed to {}", payload.status.as_str())
            }),
        });

        if payload.status == AlertLevel::Red && previous != AlertLevel::Red {
            // Red alert brings shields up automatically.
            if state.systems.shields.status != SystemStatus::Online {
                state.systems.shields.status = SystemStatus::Online;
                let shields = state.power.allocation("shields");
                let additional = 20 - shields;
                if additional > 0 {
                    if state.power.available >= additional {
                        state.power.available -= additional;
                        state.power.set_allocation("shields", 20);
                    } else {
                        state
                            .power
                            .set_allocation("shields", shields + state.power.available);
                        state.power.available = 0;
                    }
                }
            }

            let weapons = state.power.allocation("weapons");
            if weapons < 15 {
                let additional = 15 - weapons;
                if state.power.available >= additional {
                    state.power.available -= additional;
                    state.power.set_allocation("weapons", 15);
                }
            }

            effects.push(CrossModuleEffect::new(
                "crew",
                "BATTLE_STATIONS",
                json!({"reason": payload.reason}),
            ));
        }

        let kind = match payload.status {
            AlertLevel::Red => Alert::danger,
            AlertLevel::Yellow => Alert::warning,
            _ => Alert::info,
        };
        let stations = if payload.status == AlertLevel::Red {
            "battle"
        } else {
            "alert"
        };
        *alert = Some(kind(format!(
            "{} ALERT. All hands to {stations} stations.",
            payload.status.as_str().to_uppercase()
        )));
    }

    fn set_position(state: &mut ShipState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<PositionPayload>(payload) else {
            return;
        };
        if let Some(sector) = payload.sector {
            state.position.sector = sector;
        }
        if let Some(coordinates) = payload.coordinates {
            state.position.coordinates = coordinates;
        }
        if let Some(heading) = payload.heading {
            if let Some(yaw) = heading.yaw {
                state.position.heading.yaw = yaw;
            }
            if let Some(pitch) = heading.pitch {
                state.position.heading.pitch = pitch;
            }
        }
        *alert = Some(Alert::info(format!(
            "Position updated. Current sector: {}.",
            state.position.sector
        )));
    }

    fn modulate_shields(state: &mut ShipState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ModulationPayload>(payload) else {
            return;
        };
        state.systems.shields.modulation = payload.frequency;
        let harmonics = match payload.harmonics {
            Some(harmonics) => {
                state.systems.shields.harmonics = harmonics.clone();
                format!(" with {harmonics} harmonics")
            }
            None => String::new(),
        };
        *alert = Some(Alert::info(format!(
            "Shield frequency modulated to {}{harmonics}.",
            payload.frequency
        )));
    }

    fn eject_warp_core(
        state: &mut ShipState,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        state.power.warp_core.status = WarpCoreStatus::Ejected;
        state.systems.warp_drive.status = SystemStatus::Offline;
        state.systems.warp_drive.current_warp = 0;
        state.position.speed.warp = 0;

        let warp_power = state.power.allocation("warpDrive");
        state.power.total = (state.power.total - 70).max(0);
        state.power.set_allocation("warpDrive", 0);

        // Keep the essentials breathing on what's left.
        for system in ["lifeSupportSystems", "impulse", "shields"] {
            let current = state.power.allocation(system);
            if current < 10 {
                let additional = (10 - current).min(warp_power / 3);
                state.power.set_allocation(system, current + additional);
            }
        }
        state.power.recalculate_available();

        effects.push(CrossModuleEffect::new(
            "crew",
            "EMERGENCY_EVACUATION",
            json!({"area": "Engineering", "reason": "Warp core ejection"}),
        ));
        effects.push(CrossModuleEffect::new(
            "mission",
            "ADD_LOG_ENTRY",
            json!({"text": "EMERGENCY: Warp core ejected. Ship operating on emergency power."}),
        ));

        *alert = Some(Alert::danger(
            "EMERGENCY: Warp core ejected! Ship operating on emergency power systems.",
        ));
    }
}

impl GameModule for ShipModule {
    fn id(&self) -> ModuleId {
        ModuleId::from(MODULE_ID)
    }

    fn name(&self) -> &'static str {
        "Ship Systems"
    }

    fn description(&self) -> &'static str {
        "Manages ship systems, power, damage, and navigation"
    }

    fn initialize(&mut self, config: Option<&Value>) -> Result<Value> {
        let defaults = serde_json::to_value(ShipState::default())?;
        let mut state: ShipState = decode_state(MODULE_ID, merge_config(defaults, config))?;
        state.power.recalculate_available();
        let snapshot = serde_json::to_value(&state)?;
        self.state = Some(state);
        Ok(snapshot)
    }

    fn state(&self) -> Option<Value> {
        self.state.as_ref().and_then(|state| snapshot(MODULE_ID, state))
    }

    fn set_state(&mut self, state: Value) -> Result<()> {
        self.state = Some(decode_state(MODULE_ID, state)?);
        Ok(())
    }

    fn handle_action(
        &mut self,
        action: &str,
        payload: Option<&Value>,
    ) -> Option<ModuleActionResult> {
        let state = self.state.as_mut()?;
        let mut alert = None;
        let mut effects = Vec::new();

        match action {
            "SET_WARP" => Self::set_warp(state, payload, &mut alert, &mut effects),
            "RAISE_SHIELDS" => Self::raise_shields(state, &mut alert),
            "LOWER_SHIELDS" => Self::lower_shields(state, &mut alert),
            "FIRE_PHASERS" => Self::fire_phasers(state, payload, &mut alert),
            "FIRE_TORPEDOES" => Self::fire_torpedoes(state, payload, &mut alert),
            "TAKE_DAMAGE" => Self::take_damage(state, payload, &mut alert, &mut effects),
            "REPAIR_SYSTEM" => Self::repair_system(state, payload, &mut alert, &mut effects),
            "ALLOCATE_POWER" => Self::allocate_power(state, payload, &mut alert, &mut effects),
            "SET_ALERT_STATUS" => Self::set_alert_status(state, payload, &mut alert, &mut effects),
            "SET_POSITION" => Self::set_position(state, payload, &mut alert),
            "MODULATE_SHIELDS" => Self::modulate_shields(state, payload, &mut alert),
            "EJECT_WARP_CORE" => Self::eject_warp_core(state, &mut alert, &mut effects),
            _ => return None,
        }

        Some(ModuleActionResult {
            state: snapshot(MODULE_ID, state),
            alert,
            cross_module_effects: effects,
        })
    }

    fn check_condition(&self, condition: &str, params: Option<&Value>) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };

        match condition {
            "WARP_AVAILABLE" => state.systems.warp_drive.status == SystemStatus::Online,
            "SHIELDS_UP" => state.systems.shields.status == SystemStatus::Online,
            "SYSTEM_DAMAGED" => parse_payload::<SystemParam>(params)
                .map(|p| {
                    state.damage.get(&p.system).copied().unwrap_or(100) < p.threshold.unwrap_or(70)
                })
                .unwrap_or(false),
            "SYSTEM_CRITICAL" => parse_payload::<SystemParam>(params)
                .map(|p| state.damage.get(&p.system).copied().unwrap_or(100) < 30)
                .unwrap_or(false),
            "HAS_TORPEDOES" => match parse_payload::<TorpedoParam>(params).and_then(|p| p.kind) {
                Some(kind) => state
                    .systems
                    .weapons
                    .torpedoes
                    .types
                    .iter()
                    .any(|stock| stock.name == kind && stock.count > 0),
                None => state.systems.weapons.torpedoes.count > 0,
            },
            "IN_SECTOR" => parse_payload::<SectorParam>(params)
                .map(|p| state.position.sector == p.sector)
                .unwrap_or(false),
            "AT_WARP" => state.systems.warp_drive.current_warp > 0,
            "POWER_AVAILABLE" => parse_payload::<AmountParam>(params)
                .map(|p| state.power.available >= p.amount)
                .unwrap_or(false),
            "ALERT_STATUS" => parse_payload::<AlertStatusParam>(params)
                .map(|p| state.alerts.current == p.status)
                .unwrap_or(false),
            "HULL_INTEGRITY_ABOVE" => parse_payload::<ThresholdParam>(params)
                .map(|p| state.damage.get("hull").copied().unwrap_or(100) >= p.threshold)
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Rough ETA for the warp engagement message. TNG-style scaling: v = w^(10/3).
fn estimate_eta(factor: u32) -> String {
    if factor == 0 {
        return "N/A".to_string();
    }
    let mut rng = rand::thread_rng();
    let distance = rng.gen_range(1..=10) as f64;
    let speed = f64::from(factor).powf(10.0 / 3.0);
    format!("{:.1}", distance / speed * 24.0)
}
