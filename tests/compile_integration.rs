//! Integration tests for compiling pipe descriptions
//!
//! Tests ordering, pruning, wiring resolution and compile-time failures
//! through the public `compile` entry point.

mod common;

use common::builders::{loop_conf, PipeBuilder};
use pipegraph_rs::pipeline::{compile, InputSource, ModuleId, PipelineError};
use proptest::prelude::*;
use serde_json::json;

fn id(raw: &str) -> ModuleId {
    ModuleId::from_raw(raw)
}

fn position(order: &[ModuleId], raw: &str) -> usize {
    order
        .iter()
        .position(|m| m == &id(raw))
        .unwrap_or_else(|| panic!("{raw} not in order"))
}

#[test]
fn test_chain_compiles_in_dependency_order() {
    // Inserted out of order on purpose
    let graph = PipeBuilder::new()
        .module("out", "output", json!({}))
        .module("count", "count", json!({}))
        .module("src", "fetch", json!({"URL": "items.json"}))
        .wire("src", "count")
        .wire("count", "out")
        .compile("chain")
        .unwrap();

    let order: Vec<_> = graph.order().iter().map(ModuleId::as_str).collect();
    assert_eq!(order, ["src", "count", "out"]);
    assert_eq!(graph.plan().stats.active_modules, 3);
}

#[test]
fn test_default_input_is_upstream_stage() {
    let graph = PipeBuilder::new()
        .module("a", "fetch", json!({}))
        .module("b", "count", json!({}))
        .wire("a", "b")
        .compile("p")
        .unwrap();

    let a = graph.plan().step(&id("a")).unwrap();
    let b = graph.plan().step(&id("b")).unwrap();
    assert_eq!(a.args.input, InputSource::Forever);
    assert_eq!(b.args.input, InputSource::Module(id("a")));
}

#[test]
fn test_auxiliary_input_leaves_default_alone() {
    let graph = PipeBuilder::new()
        .module("a", "fetch", json!({}))
        .module("side", "fetch", json!({}))
        .module("b", "output", json!({}))
        .wire("a", "b")
        .wire_to("side", "b", "extra")
        .compile("p")
        .unwrap();

    let b = graph.plan().step(&id("b")).unwrap();
    assert_eq!(b.args.input, InputSource::Module(id("a")));
    assert_eq!(b.args.inputs, vec![("extra".to_string(), id("side"))]);
}

#[test]
fn test_auxiliary_only_module_reads_forever() {
    let graph = PipeBuilder::new()
        .module("side", "fetch", json!({}))
        .module("b", "output", json!({}))
        .wire_to("side", "b", "extra")
        .compile("p")
        .unwrap();

    assert_eq!(graph.plan().step(&id("b")).unwrap().args.input, InputSource::Forever);
}

#[test]
fn test_orphan_pruned_but_still_looked_up() {
    let graph = PipeBuilder::new()
        .module("a", "fetch", json!({}))
        .module("lonely", "datebuilder", json!({}))
        .module("b", "output", json!({}))
        .wire("a", "b")
        .compile("p")
        .unwrap();

    assert!(!graph.is_connected(&id("lonely")));
    assert!(graph.module(&id("lonely")).is_some());
    assert!(graph.plan().step(&id("lonely")).is_none());
    assert_eq!(graph.plan().stats.pruned_modules, 1);
}

#[test]
fn test_cycle_fails_without_partial_order() {
    let result = PipeBuilder::new()
        .module("a", "count", json!({}))
        .module("b", "count", json!({}))
        .module("c", "output", json!({}))
        .wire("a", "b")
        .wire("b", "a")
        .wire("b", "c")
        .compile("cyclic");

    match result {
        Err(PipelineError::CyclicGraph { nodes }) => {
            assert!(nodes.contains(&id("a")));
            assert!(nodes.contains(&id("b")));
        }
        Err(other) => panic!("expected a cycle error, got {other}"),
        Ok(_) => panic!("cyclic graph compiled"),
    }
}

#[test]
fn test_dangling_wire() {
    let result = PipeBuilder::new()
        .module("a", "fetch", json!({}))
        .wire("a", "ghost")
        .compile("p");
    assert!(matches!(result, Err(PipelineError::DanglingWire { .. })));
}

#[test]
fn test_aux_terminal_wired_twice() {
    let result = PipeBuilder::new()
        .module("a", "fetch", json!({}))
        .module("b", "fetch", json!({}))
        .module("c", "output", json!({}))
        .wire_to("a", "c", "extra")
        .wire_to("b", "c", "extra")
        .compile("p");
    assert!(matches!(result, Err(PipelineError::MalformedGraph { .. })));
}

#[test]
fn test_malformed_description() {
    let result = compile(&json!({"modules": [{"id": "a"}]}), "p");
    match result {
        Err(PipelineError::MalformedGraph { path, .. }) => assert_eq!(path, "/modules/0/type"),
        _ => panic!("expected a malformed graph error"),
    }
}

#[test]
fn test_colliding_ids_are_malformed() {
    let result = PipeBuilder::new()
        .module("sw-1", "fetch", json!({}))
        .module("sw_1", "output", json!({}))
        .compile("p");
    assert!(matches!(result, Err(PipelineError::MalformedGraph { .. })));
}

#[test]
fn test_loop_embed_is_resolved() {
    let graph = PipeBuilder::new()
        .module("src", "fetch", json!({}))
        .module(
            "each",
            "loop",
            loop_conf("sw-9", "datebuilder", json!({}), json!({"assign_to": "d"})),
        )
        .module("out", "output", json!({}))
        .wire("src", "each")
        .wire("each", "out")
        .compile("looped")
        .unwrap();

    let order = graph.order();
    assert!(position(order, "sw-9") < position(order, "each"));

    let embedded = graph.plan().step(&id("sw-9")).unwrap();
    assert!(embedded.embedded);
    assert_eq!(embedded.args.input, InputSource::Runtime);

    let each = graph.plan().step(&id("each")).unwrap();
    assert_eq!(each.args.embed, Some(id("sw-9")));
    assert_eq!(graph.plan().stats.embedded_modules, 1);
}

#[test]
fn test_split_count_and_call_form() {
    let graph = PipeBuilder::new()
        .module("src", "fetch", json!({}))
        .module("fork", "split", json!({}))
        .module("left", "count", json!({}))
        .module("right", "output", json!({}))
        .wire("src", "fork")
        .wire_terminals("fork", "_OUTPUT", "left", "_INPUT")
        .wire_terminals("fork", "_OUTPUT2", "right", "_INPUT")
        .compile("forked")
        .unwrap();

    let fork = graph.plan().step(&id("fork")).unwrap();
    assert_eq!(fork.args.splits, Some(2));
    assert_eq!(fork.to_string(), "fork = pipesplit(context, src, conf={}, splits=2)");
}

#[test]
fn test_compile_is_deterministic() {
    let description = PipeBuilder::new()
        .module("z", "fetch", json!({}))
        .module("y", "fetch", json!({}))
        .module("x", "output", json!({}))
        .wire("z", "x")
        .wire_to("y", "x", "other")
        .build();

    let first = compile(&description, "p").unwrap();
    let second = compile(&description, "p").unwrap();
    assert_eq!(first.order(), second.order());
    assert_eq!(first.plan().steps, second.plan().steps);
}

/// A random DAG: edge (i, j) only when i < j, modules inserted in a
/// shuffled order.
fn dag() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let edges = proptest::collection::vec((0..n, 0..n), 0..(n * 2)).prop_map(|pairs| {
            let mut edges: Vec<_> = pairs
                .into_iter()
                .filter(|(a, b)| a < b)
                .collect();
            edges.sort_unstable();
            edges.dedup();
            edges
        });
        let insertion = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (insertion, edges)
    })
}

fn build_dag(insertion: &[usize], edges: &[(usize, usize)]) -> serde_json::Value {
    let mut builder = PipeBuilder::new();
    for &m in insertion {
        builder = builder.module(&format!("m{m}"), "count", json!({}));
    }
    for &(a, b) in edges {
        builder = builder.wire_to(&format!("m{a}"), &format!("m{b}"), &format!("in{a}"));
    }
    builder.build()
}

proptest! {
    #[test]
    fn prop_every_edge_respects_order((insertion, edges) in dag()) {
        let graph = compile(&build_dag(&insertion, &edges), "dag").unwrap();
        let order = graph.order();
        for (a, b) in &edges {
            let respects_order =
                position(order, &format!("m{a}")) < position(order, &format!("m{b}"));
            prop_assert!(respects_order);
        }
        // Only modules touched by an edge survive pruning
        let touched: std::collections::BTreeSet<_> =
            edges.iter().flat_map(|&(a, b)| [a, b]).collect();
        prop_assert_eq!(order.len(), touched.len());
    }

    #[test]
    fn prop_order_is_pure((insertion, edges) in dag()) {
        let description = build_dag(&insertion, &edges);
        let first = compile(&description, "dag").unwrap();
        let second = compile(&description, "dag").unwrap();
        prop_assert_eq!(first.order(), second.order());
    }

    #[test]
    fn prop_back_edge_is_a_cycle((insertion, mut edges) in dag()) {
        prop_assume!(!edges.is_empty());
        let (a, b) = edges[0];
        edges.push((b, a));
        let result = compile(&build_dag(&insertion, &edges), "dag");
        let is_cycle = matches!(result, Err(PipelineError::CyclicGraph { .. }));
        prop_assert!(is_cycle);
    }
}
