// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn instr(n: u64) -> Instruction {
    serde_json::from_value(json!({
        "action": "set_var", "var": format!("v{}", n), "input": {"value": n}
    }))
    .unwrap()
}

fn var_of(entry: &Entry) -> String {
    match &entry.instruction {
        Instruction::SetVar { var, .. } => var.clone().unwrap_or_default(),
        other => panic!("unexpected instruction: {:?}", other),
    }
}

#[test]
fn normal_push_only_into_empty_queue() {
    let mut q = InstructionQueue::new();
    q.push_block([instr(1), instr(2)], false, false);
    assert_eq!(q.len(), 2);

    // Queue not empty: normal block is dropped
    q.push_block([instr(3)], false, false);
    assert_eq!(q.len(), 2);
}

#[test]
fn important_push_appends_regardless() {
    let mut q = InstructionQueue::new();
    q.push_block([instr(1)], false, false);
    q.push_block([instr(2)], true, false);
    assert_eq!(q.len(), 2);
    assert!(!q.pop_next(false).unwrap().important);
    assert!(q.pop_next(false).unwrap().important);
}

#[test]
fn urgent_push_purges_and_prepends_in_order() {
    let mut q = InstructionQueue::new();
    q.push_block([instr(1), instr(2)], false, false);
    q.push_block([instr(3)], true, false);
    // Urgent push: non-important 1 and 2 vanish; 10, 11 go to the front
    q.push_block([instr(10), instr(11)], false, true);

    let order: Vec<String> = std::iter::from_fn(|| q.pop_next(false)).map(|e| var_of(&e)).collect();
    assert_eq!(order, vec!["v10", "v11", "v3"]);
}

#[test]
fn urgent_then_normal_push_is_dropped() {
    // Spec boundary: urgent push with one important entry in queue yields
    // [urgent, important]; a subsequent normal push is dropped.
    let mut q = InstructionQueue::new();
    q.push_block([instr(1)], true, false);
    q.push_block([instr(2)], false, true);
    q.push_block([instr(3)], false, false);

    let order: Vec<String> = std::iter::from_fn(|| q.pop_next(false)).map(|e| var_of(&e)).collect();
    assert_eq!(order, vec!["v2", "v1"]);
}

#[test]
fn empty_block_is_a_no_op() {
    let mut q = InstructionQueue::new();
    q.push_block(Vec::<Instruction>::new(), false, true);
    assert!(q.is_empty());
}

#[test]
fn pop_urgent_only_extracts_from_mid_queue() {
    let mut q = InstructionQueue::new();
    // Important entries first, then an urgent block arrives: urgent lands at
    // the front. Simulate an urgent entry sitting behind importants instead
    // by pushing importants after.
    q.push_block([instr(9)], false, true);
    q.push_block([instr(1), instr(2)], true, false);

    // Move the urgent entry to the middle by popping and re-adding
    let urgent = q.pop_next(false).unwrap();
    assert!(urgent.urgent);
    q.push_block([urgent.instruction.clone()], true, false);
    // Queue is now [v1(imp), v2(imp), v9(imp)] — none urgent
    assert!(q.pop_next(true).is_none());

    // A genuine urgent entry behind importants is still found
    let mut q = InstructionQueue::new();
    q.push_block([instr(1)], true, false);
    q.push_block([instr(2)], true, false);
    // push urgent without purging importants
    q.push_block([instr(7)], false, true);
    // urgent is at front here; drain it via urgent_only
    let got = q.pop_next(true).unwrap();
    assert_eq!(var_of(&got), "v7");
    assert_eq!(q.len(), 2);
}

#[test]
fn peek_next_urgent_finds_first_urgent() {
    let mut q = InstructionQueue::new();
    let now = chrono::Utc::now();
    q.push_block([instr(1)], true, false);
    assert!(q.peek_next_urgent(now).is_none());

    q.push_block([instr(2)], false, true);
    let peeked = q.peek_next_urgent(now).unwrap();
    assert_eq!(var_of(peeked), "v2");
    // Peek does not consume
    assert_eq!(q.len(), 2);
}

#[test]
fn remove_non_important_keeps_important() {
    let mut q = InstructionQueue::new();
    q.push_block([instr(1)], false, false);
    q.push_block([instr(2)], true, false);
    q.remove_non_important();
    assert_eq!(q.len(), 1);
    assert_eq!(var_of(&q.pop_next(false).unwrap()), "v2");
}

#[test]
fn clear_empties_queue() {
    let mut q = InstructionQueue::new();
    q.push_block([instr(1), instr(2)], true, false);
    q.clear();
    assert!(q.is_empty());
    assert!(q.pop_next(false).is_none());
}

#[test]
fn event_block_tagging() {
    let mut q = InstructionQueue::new();
    q.push_block_tagged([instr(1)], false, true, true);
    let entry = q.pop_next(false).unwrap();
    assert!(entry.from_event_block);
}
