//! Hot-swap tests: models change, identity and wiring stay.

mod common;

use common::{Commander, Conductance, Exchanger, FastConductance, HeatedTank, Opener, Tank, close};
use twin_core::{KernelError, StateMap, state_map};
use twin_graph::{EdgeAliases, Graph};

#[test]
fn swapped_node_keeps_topology_and_flows() {
    let mut g = Graph::new();
    let n1 = g.add_node(Tank, Some("n1"), state_map([("a", 10.0)])).unwrap();
    let n2 = g.add_node(Tank, Some("n2"), StateMap::new()).unwrap();
    let e = g.add_edge(Conductance, n1, n2, None, state_map([("g", 0.5)])).unwrap();
    let c = g
        .add_controller(Opener, None, StateMap::new(), [("n1", n1), ("n2", n2), ("valve", e)])
        .unwrap();
    g.update(0.1, 1).unwrap();

    let before = g.node(n2).unwrap();
    let (incoming, signals) = (before.edges_incoming().to_vec(), before.signals_outgoing().to_vec());

    g.swap_node(n2, HeatedTank, StateMap::new()).unwrap();
    let after = g.node(n2).unwrap();
    assert_eq!(after.type_name(), "HeatedTank");
    assert_eq!(after.name(), Some("n2"));
    assert_eq!(after.edges_incoming(), incoming.as_slice());
    assert_eq!(after.signals_outgoing(), signals.as_slice());
    assert!(close(after.state().f64("a").unwrap(), 0.5));
    assert_eq!(after.state().f64("T").unwrap(), 300.0);
    assert_eq!(g.get_component("n2").unwrap().id(), n2);

    g.update(0.1, 3).unwrap();
    let total = g.node(n1).unwrap().state().f64("a").unwrap()
        + g.node(n2).unwrap().state().f64("a").unwrap();
    assert!(close(total, 10.0));
    assert!(g.controller(c).unwrap().snapshot()["n2"].contains_key("T"));
}

#[test]
fn swapped_edge_changes_the_flow_law() {
    let mut g = Graph::new();
    let n1 = g.add_node(Tank, None, state_map([("a", 10.0)])).unwrap();
    let n2 = g.add_node(Tank, None, StateMap::new()).unwrap();
    let e = g.add_edge(Conductance, n1, n2, None, state_map([("g", 0.5)])).unwrap();
    g.update(0.1, 1).unwrap();
    assert!(close(g.node(n1).unwrap().state().f64("a").unwrap(), 9.5));

    g.swap_edge(e, FastConductance, StateMap::new()).unwrap();
    let edge = g.edge(e).unwrap();
    assert_eq!(edge.type_name(), "FastConductance");
    assert_eq!(edge.state().f64("g").unwrap(), 0.5);
    assert_eq!((edge.source(), edge.target()), (n1, n2));

    // Rate is now 0.5 * 2 * (9.5 - 0.5) = 9.
    g.update(0.1, 1).unwrap();
    assert!(close(g.node(n1).unwrap().state().f64("a").unwrap(), 8.6));
    assert!(close(g.node(n2).unwrap().state().f64("a").unwrap(), 1.4));
}

#[test]
fn swap_overrides_seed_new_fields() {
    let mut g = Graph::new();
    let n = g.add_node(Tank, None, state_map([("a", 2.0)])).unwrap();
    g.swap_node(n, HeatedTank, state_map([("T", 550.0)])).unwrap();
    let state = g.node(n).unwrap().state();
    assert_eq!(state.f64("a").unwrap(), 2.0);
    assert_eq!(state.f64("T").unwrap(), 550.0);
}

#[test]
fn swap_dropping_aliased_field_is_rejected() {
    let mut g = Graph::new();
    let hot = g.add_node(Exchanger, None, StateMap::new()).unwrap();
    let tank = g.add_node(Tank, None, StateMap::new()).unwrap();
    let aliases = EdgeAliases::new().source("a", "fuel.U");
    g.add_edge_aliased(Conductance, hot, tank, aliases, None, StateMap::new())
        .unwrap();

    let err = g.swap_node(hot, Tank, StateMap::new()).unwrap_err();
    assert!(matches!(err, KernelError::Configuration { .. }));
    assert_eq!(g.node(hot).unwrap().type_name(), "Exchanger");
}

#[test]
fn swap_incompatible_with_staged_write_is_rejected() {
    let mut g = Graph::new();
    let n = g.add_node(HeatedTank, None, StateMap::new()).unwrap();
    let commander = Commander {
        payload: state_map([("T", 400.0)]),
    };
    g.add_controller(commander, None, StateMap::new(), [("target", n)])
        .unwrap();
    g.update(0.1, 1).unwrap();

    let err = g.swap_node(n, Tank, StateMap::new()).unwrap_err();
    assert!(matches!(err, KernelError::UnknownField { ref field, .. } if field == "T"));
    let node = g.node(n).unwrap();
    assert_eq!(node.type_name(), "HeatedTank");
    assert_eq!(node.state().f64("T").unwrap(), 300.0);

    g.update(0.1, 1).unwrap();
    assert_eq!(g.node(n).unwrap().state().f64("T").unwrap(), 400.0);
}

#[test]
fn swap_of_missing_component_is_not_found() {
    let mut g = Graph::new();
    let n = g.add_node(Tank, None, StateMap::new()).unwrap();
    let err = g.swap_edge(n, Conductance, StateMap::new()).unwrap_err();
    assert!(matches!(err, KernelError::NotFound { .. }));
}
