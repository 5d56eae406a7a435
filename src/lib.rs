//! Starlog Engine - Branching-narrative engine for starship adventure episodes
//!
//! The engine walks a scene/choice graph, evaluates choice-gating conditions,
//! and runs a set of pluggable simulation modules (ship, crew, inventory,
//! mission, registry) whose actions can cascade into each other. Campaigns
//! chain episodes with conditional branching over one continuous game state.
//!
//! Layered hexagonally:
//! - `domain`: entities, value objects, and the five game modules
//! - `application`: engine services and the ports they depend on
//! - `infrastructure`: SQLite/in-memory persistence, filesystem content,
//!   configuration, and state wiring

pub mod application;
pub mod domain;
pub mod infrastructure;
