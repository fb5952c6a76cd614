//! Closed-loop scenarios built only from the reference models.

use twin_components::{
    ACTUATOR, BangBangController, CONDUCTANCE, ConstantSource, INVENTORY, LinearConductance,
    MEASURED, PiController, RATE, Store, register_all,
};
use twin_core::{ComponentId, StateMap, state_map};
use twin_graph::{Graph, GraphDocument, TypeRegistry};

/// Large supply feeding a tank that drains at a constant 1/s through a valve.
fn drained_tank(level: f64) -> (Graph, ComponentId, ComponentId) {
    let mut g = Graph::named("unit");
    let supply = g
        .add_node(Store::new().unwrap(), Some("supply"), state_map([(INVENTORY, 1000.0)]))
        .unwrap();
    let tank = g
        .add_node(
            ConstantSource::new().unwrap(),
            Some("tank"),
            state_map([(INVENTORY, level), (RATE, -1.0)]),
        )
        .unwrap();
    let valve = g
        .add_edge(LinearConductance::new().unwrap(), supply, tank, Some("valve"), StateMap::new())
        .unwrap();
    (g, tank, valve)
}

fn level(g: &Graph, tank: ComponentId) -> f64 {
    g.node(tank).unwrap().state().f64(INVENTORY).unwrap()
}

#[test]
fn pi_holds_level_at_setpoint() {
    let (mut g, tank, valve) = drained_tank(0.0);
    g.add_controller(
        PiController::new().unwrap(),
        Some("level"),
        state_map([("setpoint", 5.0), ("kp", 0.002), ("ti", 2.0)]),
        [(MEASURED, tank), (ACTUATOR, valve)],
    )
    .unwrap();

    g.update(0.01, 2000).unwrap();
    assert!((level(&g, tank) - 5.0).abs() < 0.05, "level {}", level(&g, tank));
    assert!((g.time() - 20.0).abs() < 1e-9);
}

#[test]
fn bang_bang_keeps_level_in_band() {
    let (mut g, tank, valve) = drained_tank(5.0);
    g.add_controller(
        BangBangController::new().unwrap(),
        Some("level"),
        state_map([("low", 4.0), ("high", 6.0), ("on_value", 0.003)]),
        [(MEASURED, tank), (ACTUATOR, valve)],
    )
    .unwrap();

    let mut switched_on = false;
    for _ in 0..1000 {
        g.update(0.01, 1).unwrap();
        let l = level(&g, tank);
        assert!((3.9..=6.1).contains(&l), "level {l} left the band");
        switched_on |= g.edge(valve).unwrap().state().f64(CONDUCTANCE).unwrap() > 0.0;
    }
    assert!(switched_on);
}

#[test]
fn saved_loop_resumes_identically() {
    let (mut g, tank, valve) = drained_tank(2.0);
    g.add_controller(
        PiController::new().unwrap(),
        Some("level"),
        state_map([("setpoint", 5.0), ("kp", 0.002), ("ti", 2.0)]),
        [(MEASURED, tank), (ACTUATOR, valve)],
    )
    .unwrap();
    g.update(0.01, 50).unwrap();

    let mut registry = TypeRegistry::new();
    register_all(&mut registry).unwrap();
    let text = g.to_document().to_json().unwrap();
    let mut loaded = Graph::from_document(&GraphDocument::from_json(&text).unwrap(), &registry)
        .unwrap();

    g.update(0.01, 50).unwrap();
    loaded.update(0.01, 50).unwrap();
    assert_eq!(level(&loaded, tank), level(&g, tank));
    assert_eq!(loaded.to_document(), g.to_document());
}

#[test]
fn register_all_rejects_second_registration() {
    let mut registry = TypeRegistry::new();
    register_all(&mut registry).unwrap();
    assert!(registry.contains("PiController"));
    assert!(register_all(&mut registry).is_err());
}

#[test]
fn custom_configurations_reload_unchanged() {
    let mut g = Graph::named("unit");
    let store = || Store::with_fields([INVENTORY, "water"]).unwrap();
    let a = g
        .add_node(store(), Some("a"), state_map([(INVENTORY, 1.0), ("water", 5.0)]))
        .unwrap();
    let b = g.add_node(store(), Some("b"), StateMap::new()).unwrap();
    let pipe = g
        .add_edge(
            LinearConductance::transporting(["water"]).unwrap(),
            a,
            b,
            Some("pipe"),
            state_map([(CONDUCTANCE, 1.0)]),
        )
        .unwrap();
    g.add_controller(
        BangBangController::watching("water", CONDUCTANCE).unwrap(),
        Some("guard"),
        state_map([("low", 1.0), ("high", 3.0)]),
        [(MEASURED, b), (ACTUATOR, pipe)],
    )
    .unwrap();

    let mut registry = TypeRegistry::new();
    register_all(&mut registry).unwrap();
    let text = g.to_document().to_json().unwrap();
    let mut loaded = Graph::from_document(&GraphDocument::from_json(&text).unwrap(), &registry)
        .unwrap();
    assert_eq!(loaded.to_document(), g.to_document());

    g.update(0.1, 5).unwrap();
    loaded.update(0.1, 5).unwrap();
    let b_state = |graph: &Graph| graph.node(b).unwrap().state().snapshot();
    assert_eq!(b_state(&loaded), b_state(&g));
    // Only water moves; the inventory stays where it started.
    assert_eq!(loaded.node(b).unwrap().state().f64(INVENTORY).unwrap(), 0.0);
    assert!(loaded.node(b).unwrap().state().f64("water").unwrap() > 0.0);
}
