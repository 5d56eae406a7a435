//! Inventory module - ship stores, equipment assignment, and the replicator

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::modules::{decode_state, merge_config, parse_payload, snapshot, GameModule};
use crate::domain::value_objects::{Alert, CrossModuleEffect, ModuleActionResult, ModuleId};

const MODULE_ID: &str = "inventory";
const PERSONAL_EQUIPMENT: &str = "personal equipment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Tool,
    Medical,
    Artifact,
    Resource,
    Communication,
    Misc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Unique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSize {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Durability {
    pub current: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEffect {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ItemSize>,
    #[serde(default)]
    pub usable: bool,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<Durability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<ItemEffect>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    pub name: String,
    pub capacity: i64,
    pub current_items: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
    /// Departments or specific crew ids allowed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_to: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryState {
    pub items: Vec<InventoryItem>,
    /// Maximum total item count across all stores.
    pub capacity: i64,
    pub total_items: i64,
    pub total_weight: f64,
    pub locations: BTreeMap<String, StorageLocation>,
    pub replicator_templates: Vec<String>,
    pub replicator_energy: i64,
}

impl Default for InventoryState {
    fn default() -> Self {
        let items = vec![
            InventoryItem {
                id: "phaser-type2".to_string(),
                name: "Type-2 Phaser".to_string(),
                description: "Standard Starfleet hand phaser with multiple settings from stun to kill.".to_string(),
                kind: ItemKind::Weapon,
                quantity: 25,
                properties: properties(&[
                    ("settings", json!(["stun", "kill", "heat", "disintegrate"])),
                    ("powerLevel", json!(100)),
                    ("maxRange", json!(50)),
                    ("accuracy", json!(95)),
                ]),
                location: Some("weapons locker".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Common),
                weight: Some(0.3),
                size: Some(ItemSize::Small),
                usable: true,
                consumable: false,
                durability: Some(Durability { current: 100, max: 100 }),
                effects: vec![
                    ItemEffect {
                        kind: "damage".to_string(),
                        target: "organic".to_string(),
                        value: json!(50),
                        duration: None,
                    },
                    ItemEffect {
                        kind: "stun".to_string(),
                        target: "organic".to_string(),
                        value: json!(30),
                        duration: Some(10),
                    },
                ],
            },
            InventoryItem {
                id: "tricorder".to_string(),
                name: "Tricorder".to_string(),
                description: "Multipurpose scientific analysis and scanning device.".to_string(),
                kind: ItemKind::Tool,
                quantity: 15,
                properties: properties(&[
                    ("scanRange", json!(100)),
                    ("accuracy", json!(95)),
                    ("modes", json!(["biological", "geological", "meteorological", "physical"])),
                ]),
                location: Some("science lab".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Common),
                weight: Some(0.5),
                size: Some(ItemSize::Small),
                usable: true,
                consumable: false,
                durability: Some(Durability { current: 100, max: 100 }),
                effects: Vec::new(),
            },
            InventoryItem {
                id: "medical-kit".to_string(),
                name: "Medical Kit".to_string(),
                description: "Standard medical field kit with basic supplies and diagnostic tools.".to_string(),
                kind: ItemKind::Medical,
                quantity: 10,
                properties: properties(&[
                    ("treatments", json!(["wounds", "burns", "infections", "basic surgery"])),
                    ("charges", json!(20)),
                ]),
                location: Some("sickbay".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Common),
                weight: Some(2.0),
                size: Some(ItemSize::Medium),
                usable: true,
                consumable: true,
                durability: None,
                effects: vec![ItemEffect {
                    kind: "heal".to_string(),
                    target: "organic".to_string(),
                    value: json!(30),
                    duration: None,
                }],
            },
            InventoryItem {
                id: "communicator".to_string(),
                name: "Communicator Badge".to_string(),
                description: "Standard Starfleet communicator for ship-to-person communication.".to_string(),
                kind: ItemKind::Communication,
                quantity: 50,
                properties: properties(&[
                    ("range", json!("planetary")),
                    ("encryption", json!("standard")),
                    ("tracking", json!(true)),
                ]),
                location: Some("quartermaster".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Common),
                weight: Some(0.05),
                size: Some(ItemSize::Tiny),
                usable: true,
                consumable: false,
                durability: None,
                effects: Vec::new(),
            },
            InventoryItem {
                id: "pattern-enhancer".to_string(),
                name: "Transporter Pattern Enhancer".to_string(),
                description: "Device that improves transporter signal in difficult environments.".to_string(),
                kind: ItemKind::Tool,
                quantity: 9,
                properties: properties(&[("range", json!(500)), ("reliability", json!(90))]),
                location: Some("transporter room".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Uncommon),
                weight: Some(1.5),
                size: Some(ItemSize::Medium),
                usable: true,
                consumable: false,
                durability: None,
                effects: Vec::new(),
            },
            InventoryItem {
                id: "dilithium-crystal".to_string(),
                name: "Dilithium Crystal".to_string(),
                description: "Rare mineral used to regulate matter/antimatter reactions in warp cores.".to_string(),
                kind: ItemKind::Resource,
                quantity: 3,
                properties: properties(&[
                    ("purity", json!(98.7)),
                    ("stability", json!(99.2)),
                ]),
                location: Some("engineering secure storage".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Rare),
                weight: Some(5.0),
                size: Some(ItemSize::Small),
                usable: false,
                consumable: false,
                durability: None,
                effects: Vec::new(),
            },
            InventoryItem {
                id: "emergency-ration".to_string(),
                name: "Emergency Ration Pack".to_string(),
                description: "Concentrated food supplies for emergency situations.".to_string(),
                kind: ItemKind::Resource,
                quantity: 100,
                properties: properties(&[("calories", json!(3000)), ("servings", json!(1))]),
                location: Some("cargo bay".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Common),
                weight: Some(0.5),
                size: Some(ItemSize::Small),
                usable: true,
                consumable: true,
                durability: None,
                effects: vec![ItemEffect {
                    kind: "nutrition".to_string(),
                    target: "organic".to_string(),
                    value: json!(100),
                    duration: None,
                }],
            },
            InventoryItem {
                id: "class-3-probe".to_string(),
                name: "Class 3 Probe".to_string(),
                description: "Standard long-range sensor probe for scientific and tactical reconnaissance.".to_string(),
                kind: ItemKind::Tool,
                quantity: 12,
                properties: properties(&[
                    ("range", json!(5_000_000)),
                    ("sensors", json!(["subspace", "graviton", "electromagnetic"])),
                ]),
                location: Some("shuttle bay".to_string()),
                assigned_to: None,
                rarity: Some(Rarity::Uncommon),
                weight: Some(150.0),
                size: Some(ItemSize::Large),
                usable: true,
                consumable: true,
                durability: None,
                effects: Vec::new(),
            },
        ];

        let locations = [
            ("weapons locker", "Weapons Locker", 100, 25, Some(SecurityLevel::High), Some(vec!["security", "command"])),
            ("science lab", "Science Lab", 200, 15, Some(SecurityLevel::Medium), Some(vec!["science", "command"])),
            ("sickbay", "Sickbay", 150, 10, Some(SecurityLevel::Medium), Some(vec!["medical", "command"])),
            ("quartermaster", "Quartermaster's Office", 300, 50, Some(SecurityLevel::Low), Some(vec!["operations", "command"])),
            ("transporter room", "Transporter Room", 50, 9, Some(SecurityLevel::Medium), Some(vec!["operations", "engineering", "command"])),
            ("engineering secure storage", "Engineering Secure Storage", 100, 3, Some(SecurityLevel::High), Some(vec!["engineering", "command"])),
            ("cargo bay", "Main Cargo Bay", 5000, 100, Some(SecurityLevel::Low), None),
            ("shuttle bay", "Shuttle Bay", 1000, 12, Some(SecurityLevel::Medium), Some(vec!["operations", "command"])),
            (PERSONAL_EQUIPMENT, "Personal Equipment", 500, 0, Some(SecurityLevel::Low), None),
        ]
        .into_iter()
        .map(|(id, name, capacity, current, security, access)| {
            (
                id.to_string(),
                StorageLocation {
                    name: name.to_string(),
                    capacity,
                    current_items: current,
                    security_level: security,
                    accessible_to: access
                        .map(|list| list.into_iter().map(str::to_string).collect()),
                },
            )
        })
        .collect();

        let mut state = Self {
            items,
            capacity: 1000,
            total_items: 0,
            total_weight: 0.0,
            locations,
            replicator_templates: vec![
                "emergency-ration".to_string(),
                "communicator".to_string(),
                "uniform".to_string(),
                "water".to_string(),
                "basic-tools".to_string(),
            ],
            replicator_energy: 100,
        };
        recompute_totals(&mut state);
        state
    }
}

fn properties(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

fn recompute_totals(state: &mut InventoryState) {
    state.total_items = state.items.iter().map(|item| i64::from(item.quantity)).sum();
    state.total_weight = state
        .items
        .iter()
        .map(|item| item.weight.unwrap_or(0.0) * f64::from(item.quantity))
        .sum();
}

fn adjust_location_count(state: &mut InventoryState, location: Option<&str>, delta: i64) {
    if let Some(slot) = location.and_then(|id| state.locations.get_mut(id)) {
        slot.current_items = (slot.current_items + delta).max(0);
    }
}

fn item_property_i64(item: &InventoryItem, key: &str) -> Option<i64> {
    item.properties.get(key).and_then(Value::as_i64)
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddItemPayload {
    item: InventoryItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRefPayload {
    item_id: String,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    max_charges: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UseItemPayload {
    item_id: String,
    #[serde(default)]
    consume: Option<bool>,
    #[serde(default)]
    durability_loss: Option<i64>,
    #[serde(default)]
    use_charge: Option<bool>,
    #[serde(default)]
    power_amount: Option<i64>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    target_type: Option<String>,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    scan_target: Option<String>,
    #[serde(default)]
    scan_results: Option<String>,
    #[serde(default)]
    discovery_id: Option<String>,
    #[serde(default)]
    launch_coordinates: Option<String>,
    #[serde(default)]
    objective_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLocationPayload {
    location_id: String,
    name: String,
    capacity: i64,
    #[serde(default)]
    security_level: Option<SecurityLevel>,
    #[serde(default)]
    accessible_to: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzePayload {
    item_id: String,
    #[serde(default)]
    analysis_results: Option<String>,
    #[serde(default)]
    discovery_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemParam {
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    energy_cost: Option<i64>,
    #[serde(default)]
    check_charges: Option<bool>,
    #[serde(default)]
    check_power: Option<bool>,
    #[serde(default)]
    min_power: Option<i64>,
    #[serde(default)]
    check_durability: Option<bool>,
    #[serde(default)]
    min_durability: Option<i64>,
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Manages ship inventory, equipment, and resources.
pub struct InventoryModule {
    state: Option<InventoryState>,
}

impl InventoryModule {
    pub fn new() -> Self {
        Self { state: None }
    }

    fn add_item(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<AddItemPayload>(payload) else {
            return;
        };
        let incoming = payload.item;
        let added = incoming.quantity;

        match state.items.iter_mut().find(|item| item.id == incoming.id) {
            Some(existing) => {
                existing.quantity += added;
                let location = existing.location.clone();
                let name = existing.name.clone();
                adjust_location_count(state, location.as_deref(), i64::from(added));
                *alert = Some(Alert::success(format!(
                    "Added {added} {name}(s) to inventory."
                )));
            }
            None => {
                let name = incoming.name.clone();
                let location = incoming.location.clone();
                state.items.push(incoming);
                adjust_location_count(state, location.as_deref(), i64::from(added));
                *alert = Some(Alert::success(format!(
                    "Added new item: {name} to inventory."
                )));
            }
        }

        recompute_totals(state);

        if state.total_items * 10 > state.capacity * 9 {
            let used = (state.total_items as f64 / state.capacity as f64 * 100.0).round();
            *alert = Some(Alert::warning(format!("Inventory at {used}% capacity.")));
        }
    }

    fn remove_item(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let quantity = payload.quantity.unwrap_or(1);
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let item = &state.items[position];
        let name = item.name.clone();
        let location = item.location.clone();

        if item.quantity <= quantity {
            let removed = i64::from(item.quantity);
            state.items.remove(position);
            adjust_location_count(state, location.as_deref(), -removed);
            *alert = Some(Alert::info(format!(
                "Removed all {name}(s) from inventory."
            )));
        } else {
            state.items[position].quantity -= quantity;
            adjust_location_count(state, location.as_deref(), -i64::from(quantity));
            *alert = Some(Alert::info(format!(
                "Removed {quantity} {name}(s) from inventory."
            )));
        }

        recompute_totals(state);
    }

    fn assign_item(
        state: &mut InventoryState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let Some(crew_id) = payload.crew_id else {
            return;
        };
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let quantity = payload.quantity.unwrap_or(1).max(1);
        let original = state.items[position].clone();
        let name = original.name.clone();

        if original.quantity <= quantity {
            // Whole stack changes hands.
            state.items[position].assigned_to = Some(crew_id.clone());
            state.items[position].location = Some(PERSONAL_EQUIPMENT.to_string());
            adjust_location_count(
                state,
                original.location.as_deref(),
                -i64::from(original.quantity),
            );
            adjust_location_count(state, Some(PERSONAL_EQUIPMENT), i64::from(original.quantity));
        } else {
            state.items[position].quantity = original.quantity - quantity;
            let mut assigned = original.clone();
            assigned.quantity = quantity;
            assigned.assigned_to = Some(crew_id.clone());
            assigned.location = Some(PERSONAL_EQUIPMENT.to_string());
            state.items.push(assigned);
            adjust_location_count(state, original.location.as_deref(), -i64::from(quantity));
            adjust_location_count(state, Some(PERSONAL_EQUIPMENT), i64::from(quantity));
        }

        effects.push(CrossModuleEffect::new(
            "crew",
            "NOTIFY_EQUIPMENT_ASSIGNMENT",
            json!({
                "crewId": crew_id,
                "itemId": payload.item_id,
                "itemName": name,
            }),
        ));
        *alert = Some(Alert::success(format!("{name} assigned to crew member.")));
    }

    fn unassign_item(
        state: &mut InventoryState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let new_location = payload
            .location
            .unwrap_or_else(|| "quartermaster".to_string());
        let quantity = i64::from(state.items[position].quantity);
        let crew_id = state.items[position].assigned_to.take();
        state.items[position].location = Some(new_location.clone());
        let name = state.items[position].name.clone();

        adjust_location_count(state, Some(PERSONAL_EQUIPMENT), -quantity);
        adjust_location_count(state, Some(new_location.as_str()), quantity);

        if let Some(crew_id) = crew_id {
            effects.push(CrossModuleEffect::new(
                "crew",
                "NOTIFY_EQUIPMENT_REMOVAL",
                json!({
                    "crewId": crew_id,
                    "itemId": payload.item_id,
                    "itemName": name,
                }),
            ));
        }

        *alert = Some(Alert::info(format!("{name} returned to {new_location}.")));
    }

    fn move_item(
        state: &mut InventoryState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let Some(destination) = payload.location else {
            return;
        };
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let Some(slot) = state.locations.get(&destination) else {
            *alert = Some(Alert::warning(format!(
                "Location {destination} does not exist."
            )));
            return;
        };

        let quantity = payload
            .quantity
            .unwrap_or(state.items[position].quantity);
        let available = slot.capacity - slot.current_items;
        if i64::from(quantity) > available {
            *alert = Some(Alert::warning(format!(
                "Not enough space in {destination}. Only {available} slots available."
            )));
            return;
        }

        if payload.crew_id.is_some() && slot.security_level == Some(SecurityLevel::High) {
            if let Some(access) = &slot.accessible_to {
                let department = payload.department.clone().unwrap_or_default();
                if !access.contains(&department) {
                    *alert = Some(Alert::danger(format!(
                        "Access denied to {destination}. Security clearance required."
                    )));
                    effects.push(CrossModuleEffect::new(
                        "mission",
                        "ADD_LOG_ENTRY",
                        json!({
                            "text": format!(
                                "Security alert: Unauthorized access attempt to {destination} by crew ID {}.",
                                payload.crew_id.unwrap_or_default()
                            ),
                        }),
                    ));
                    return;
                }
            }
        }

        let origin = state.items[position].location.clone();
        let name = state.items[position].name.clone();

        if quantity < state.items[position].quantity {
            state.items[position].quantity -= quantity;
            let mut moved = state.items[position].clone();
            moved.quantity = quantity;
            moved.location = Some(destination.clone());
            state.items.push(moved);
        } else {
            state.items[position].location = Some(destination.clone());
        }

        adjust_location_count(state, origin.as_deref(), -i64::from(quantity));
        adjust_location_count(state, Some(destination.as_str()), i64::from(quantity));

        *alert = Some(Alert::success(format!(
            "Moved {quantity} {name}(s) to {destination}."
        )));
    }

    fn use_item(
        state: &mut InventoryState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<UseItemPayload>(payload) else {
            return;
        };
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let item = state.items[position].clone();
        if !item.usable {
            *alert = Some(Alert::warning(format!(
                "{} cannot be used directly.",
                item.name
            )));
            return;
        }

        let mut removed = false;
        if payload.consume.unwrap_or(false) || item.consumable {
            if item.quantity <= 1 {
                state.items.remove(position);
                removed = true;
            } else {
                state.items[position].quantity -= 1;
            }
            adjust_location_count(state, item.location.as_deref(), -1);
            recompute_totals(state);
        }

        if !removed {
            if let Some(durability) = state.items[position].durability.as_mut() {
                let loss = payload.durability_loss.unwrap_or(5);
                durability.current = (durability.current - loss).max(0);
                if durability.current == 0 {
                    *alert = Some(Alert::warning(format!(
                        "{} is now broken and needs repair.",
                        item.name
                    )));
                }
            }

            if payload.use_charge.unwrap_or(false) {
                if let Some(charges) = item_property_i64(&state.items[position], "charges") {
                    let remaining = (charges - 1).max(0);
                    state.items[position]
                        .properties
                        .insert("charges".to_string(), json!(remaining));
                    if remaining == 0 {
                        *alert = Some(Alert::warning(format!(
                            "{} is depleted and needs recharging.",
                            item.name
                        )));
                    }
                } else if let Some(power) = item_property_i64(&state.items[position], "powerLevel")
                {
                    let drain = payload.power_amount.unwrap_or(10);
                    let remaining = (power - drain).max(0);
                    state.items[position]
                        .properties
                        .insert("powerLevel".to_string(), json!(remaining));
                    if remaining == 0 {
                        *alert = Some(Alert::warning(format!(
                            "{} is out of power and needs recharging.",
                            item.name
                        )));
                    }
                }
            }
        }

        // Item effects translate into cross-module consequences.
        if payload.target.is_some() {
            for effect in &item.effects {
                if Some(&effect.target) != payload.target_type.as_ref() {
                    continue;
                }
                match effect.kind.as_str() {
                    "heal" => {
                        if let Some(crew_id) = &payload.crew_id {
                            effects.push(CrossModuleEffect::new(
                                "crew",
                                "HEAL_CREW",
                                json!({"crewId": crew_id, "amount": effect.value}),
                            ));
                        }
                    }
                    "damage" => {
                        if let Some(target_id) = &payload.target_id {
                            effects.push(CrossModuleEffect::new(
                                "ship",
                                "TAKE_DAMAGE",
                                json!({"system": target_id, "amount": effect.value}),
                            ));
                        }
                    }
                    "boost" => {
                        if let Some(crew_id) = &payload.crew_id {
                            effects.push(CrossModuleEffect::new(
                                "crew",
                                "BOOST_MORALE",
                                json!({"crewId": crew_id, "amount": effect.value}),
                            ));
                        }
                    }
                    _ => {}
                }
            }
        }

        if item.id == "tricorder" {
            if let Some(scan_target) = &payload.scan_target {
                effects.push(CrossModuleEffect::new(
                    "mission",
                    "ADD_LOG_ENTRY",
                    json!({
                        "text": format!(
                            "Tricorder scan of {scan_target}: {}",
                            payload
                                .scan_results
                                .clone()
                                .unwrap_or_else(|| "No anomalies detected.".to_string())
                        ),
                    }),
                ));
                if let Some(discovery_id) = &payload.discovery_id {
                    effects.push(CrossModuleEffect::new(
                        "registry",
                        "DISCOVER_ENTRY",
                        json!({"entryId": discovery_id}),
                    ));
                }
            }
        } else if item.id == "class-3-probe" {
            if let Some(coordinates) = &payload.launch_coordinates {
                effects.push(CrossModuleEffect::new(
                    "mission",
                    "ADD_LOG_ENTRY",
                    json!({"text": format!("Class 3 probe launched to coordinates {coordinates}.")}),
                ));
                if let Some(objective_id) = &payload.objective_id {
                    effects.push(CrossModuleEffect::new(
                        "mission",
                        "COMPLETE_OBJECTIVE",
                        json!({"objectiveId": objective_id}),
                    ));
                }
            }
        }

        if alert.is_none() {
            *alert = Some(Alert::success(format!("Used {} successfully.", item.name)));
        }
    }

    fn repair_item(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let Some(item) = state
            .items
            .iter_mut()
            .find(|item| item.id == payload.item_id)
        else {
            return;
        };

        let Some(durability) = item.durability.as_mut() else {
            *alert = Some(Alert::warning(format!(
                "{} does not have durability to repair.",
                item.name
            )));
            return;
        };

        let repair = payload.amount.unwrap_or(durability.max / 2);
        durability.current = (durability.current + repair).min(durability.max);

        if durability.current == durability.max {
            *alert = Some(Alert::success(format!("{} fully repaired.", item.name)));
        } else {
            let percent =
                (durability.current as f64 / durability.max as f64 * 100.0).round() as i64;
            *alert = Some(Alert::info(format!(
                "{} partially repaired ({percent}%).",
                item.name
            )));
        }
    }

    fn recharge_item(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            return;
        };

        let name = state.items[position].name.clone();
        if item_property_i64(&state.items[position], "charges").is_some() {
            let max_charges = payload.max_charges.unwrap_or(20);
            state.items[position]
                .properties
                .insert("charges".to_string(), json!(max_charges));
            *alert = Some(Alert::success(format!(
                "{name} recharged to {max_charges} charges."
            )));
        } else if item_property_i64(&state.items[position], "powerLevel").is_some() {
            state.items[position]
                .properties
                .insert("powerLevel".to_string(), json!(100));
            *alert = Some(Alert::success(format!(
                "{name} power level restored to 100%."
            )));
        } else {
            *alert = Some(Alert::warning(format!("{name} cannot be recharged.")));
        }
    }

    fn replicate_item(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ItemRefPayload>(payload) else {
            return;
        };

        if state.replicator_energy < 10 {
            *alert = Some(Alert::warning(
                "Insufficient replicator energy. Please wait for recharge.",
            ));
            return;
        }
        if !state.replicator_templates.contains(&payload.item_id) {
            *alert = Some(Alert::warning(
                "Item template not found in replicator database.",
            ));
            return;
        }
        let Some(position) = state.items.iter().position(|item| item.id == payload.item_id)
        else {
            *alert = Some(Alert::warning(
                "Item template exists but no reference item found.",
            ));
            return;
        };

        let quantity = payload.quantity.unwrap_or(1).max(1);
        let per_item = match state.items[position].rarity {
            Some(Rarity::Rare) => 30,
            Some(Rarity::Uncommon) => 15,
            _ => 10,
        };
        let energy_cost = i64::from(quantity) * per_item;

        if state.replicator_energy < energy_cost {
            *alert = Some(Alert::warning(format!(
                "Insufficient replicator energy. Required: {energy_cost}, Available: {}.",
                state.replicator_energy
            )));
            return;
        }

        let name = state.items[position].name.clone();
        let location = state.items[position].location.clone();
        state.items[position].quantity += quantity;
        adjust_location_count(state, location.as_deref(), i64::from(quantity));
        state.replicator_energy -= energy_cost;
        recompute_totals(state);

        *alert = Some(Alert::success(format!(
            "Successfully replicated {quantity} {name}(s)."
        )));
    }

    fn create_location(state: &mut InventoryState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<CreateLocationPayload>(payload) else {
            return;
        };
        if state.locations.contains_key(&payload.location_id) {
            *alert = Some(Alert::warning(format!(
                "Location {} already exists.",
                payload.name
            )));
            return;
        }

        state.locations.insert(
            payload.location_id,
            StorageLocation {
                name: payload.name.clone(),
                capacity: payload.capacity,
                current_items: 0,
                security_level: payload.security_level.or(Some(SecurityLevel::Low)),
                accessible_to: payload.accessible_to,
            },
        );

        *alert = Some(Alert::success(format!(
            "Created new storage location: {}.",
            payload.name
        )));
    }

    fn analyze_item(
        state: &mut InventoryState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<AnalyzePayload>(payload) else {
            return;
        };
        let Some(item) = state.items.iter().find(|item| item.id == payload.item_id) else {
            *alert = Some(Alert::warning("Item not found in inventory."));
            return;
        };

        effects.push(CrossModuleEffect::new(
            "mission",
            "ADD_LOG_ENTRY",
            json!({
                "text": format!(
                    "Item analysis of {}: {}",
                    item.name,
                    payload
                        .analysis_results
                        .unwrap_or_else(|| "Standard Starfleet issue.".to_string())
                ),
            }),
        ));
        if let Some(discovery_id) = payload.discovery_id {
            effects.push(CrossModuleEffect::new(
                "registry",
                "DISCOVER_ENTRY",
                json!({"entryId": discovery_id}),
            ));
        }

        *alert = Some(Alert::info(format!("Analysis of {} complete.", item.name)));
    }
}

impl GameModule for InventoryModule {
    fn id(&self) -> ModuleId {
        ModuleId::from(MODULE_ID)
    }

    fn name(&self) -> &'static str {
        "Inventory Management"
    }

    fn description(&self) -> &'static str {
        "Manages ship inventory, equipment, and resources"
    }

    fn initialize(&mut self, config: Option<&Value>) -> Result<Value> {
        let defaults = serde_json::to_value(InventoryState::default())?;
        let mut state: InventoryState = decode_state(MODULE_ID, merge_config(defaults, config))?;
        recompute_totals(&mut state);
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
            "ADD_ITEM" => Self::add_item(state, payload, &mut alert),
            "REMOVE_ITEM" => Self::remove_item(state, payload, &mut alert),
            "ASSIGN_ITEM" => Self::assign_item(state, payload, &mut alert, &mut effects),
            "UNASSIGN_ITEM" => Self::unassign_item(state, payload, &mut alert, &mut effects),
            "MOVE_ITEM" => Self::move_item(state, payload, &mut alert, &mut effects),
            "USE_ITEM" => Self::use_item(state, payload, &mut alert, &mut effects),
            "REPAIR_ITEM" => Self::repair_item(state, payload, &mut alert),
            "RECHARGE_ITEM" => Self::recharge_item(state, payload, &mut alert),
            "REPLICATE_ITEM" => Self::replicate_item(state, payload, &mut alert),
            "CREATE_LOCATION" => Self::create_location(state, payload, &mut alert),
            "ANALYZE_ITEM" => Self::analyze_item(state, payload, &mut alert, &mut effects),
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
        let Some(params) = parse_payload::<ItemParam>(params) else {
            return false;
        };

        match condition {
            "HAS_ITEM" => params
                .item_id
                .map(|item_id| {
                    state.items.iter().any(|item| {
                        item.id == item_id && item.quantity >= params.quantity.unwrap_or(1)
                    })
                })
                .unwrap_or(false),
            "ITEM_ASSIGNED" => match (params.item_id, params.crew_id) {
                (Some(item_id), Some(crew_id)) => state
                    .items
                    .iter()
                    .any(|item| item.id == item_id && item.assigned_to.as_deref() == Some(&crew_id)),
                _ => false,
            },
            "ITEM_IN_LOCATION" => match (params.item_id, params.location) {
                (Some(item_id), Some(location)) => state
                    .items
                    .iter()
                    .any(|item| item.id == item_id && item.location.as_deref() == Some(&location)),
                _ => false,
            },
            "ITEM_USABLE" => {
                let Some(item) = params
                    .item_id
                    .and_then(|item_id| state.items.iter().find(|item| item.id == item_id))
                else {
                    return false;
                };
                if params.check_charges.unwrap_or(false) {
                    if let Some(charges) = item_property_i64(item, "charges") {
                        return charges > 0;
                    }
                }
                if params.check_power.unwrap_or(false) {
                    if let Some(power) = item_property_i64(item, "powerLevel") {
                        return power > params.min_power.unwrap_or(0);
                    }
                }
                if params.check_durability.unwrap_or(false) {
                    if let Some(durability) = &item.durability {
                        return durability.current > params.min_durability.unwrap_or(0);
                    }
                }
                item.usable
            }
            "CAN_REPLICATE" => params
                .item_id
                .map(|item_id| {
                    state.replicator_templates.contains(&item_id)
                        && state.replicator_energy >= params.energy_cost.unwrap_or(10)
                })
                .unwrap_or(false),
            "LOCATION_HAS_SPACE" => params
                .location
                .and_then(|location| state.locations.get(&location))
                .map(|slot| {
                    slot.capacity - slot.current_items >= i64::from(params.quantity.unwrap_or(1))
                })
                .unwrap_or(false),
            "HAS_ACCESS_TO_LOCATION" => {
                let (Some(location), Some(department)) = (params.location, params.department)
                else {
                    return false;
                };
                let Some(slot) = state.locations.get(&location) else {
                    return false;
                };
                if slot.security_level == Some(SecurityLevel::Low) {
                    return true;
                }
                let Some(access) = &slot.accessible_to else {
                    return false;
                };
                access.contains(&department)
                    || params
                        .crew_id
                        .map(|crew_id| access.contains(&crew_id))
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}
