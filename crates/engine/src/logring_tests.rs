// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn push_and_snapshot() {
    let ring = LogRing::default();
    let dest = DestinationId::new("d1");
    let now = Utc::now();
    ring.push(&dest, now, "first");
    ring.push(&dest, now, "second");

    let lines = ring.snapshot(&dest);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].line, "first");
    assert_eq!(lines[1].line, "second");
}

#[test]
fn ring_is_bounded() {
    let ring = LogRing::default();
    let dest = DestinationId::new("d1");
    let now = Utc::now();
    for i in 0..(LOG_RING_CAP + 25) {
        ring.push(&dest, now, format!("line {}", i));
    }
    let lines = ring.snapshot(&dest);
    assert_eq!(lines.len(), LOG_RING_CAP);
    // Oldest lines were dropped
    assert_eq!(lines[0].line, "line 25");
}

#[test]
fn destinations_are_independent() {
    let ring = LogRing::default();
    let now = Utc::now();
    ring.push(&DestinationId::new("a"), now, "for a");
    assert!(ring.snapshot(&DestinationId::new("b")).is_empty());
}

#[test]
fn clear_drops_lines() {
    let ring = LogRing::default();
    let dest = DestinationId::new("d1");
    ring.push(&dest, Utc::now(), "line");
    ring.clear(&dest);
    assert!(ring.snapshot(&dest).is_empty());
}
