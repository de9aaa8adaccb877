// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn parse(doc: serde_json::Value) -> Instruction {
    serde_json::from_value(doc).unwrap()
}

#[test]
fn set_var_shapes() {
    let instr = parse(json!({
        "action": "set_var",
        "var": "greeting",
        "input": {"value": "hello"}
    }));
    match instr {
        Instruction::SetVar { var, input, default } => {
            assert_eq!(var.as_deref(), Some("greeting"));
            assert_eq!(input.unwrap().value, Some(json!("hello")));
            assert!(default.is_none());
        }
        other => panic!("wrong instruction: {:?}", other),
    }

    // var = null clears the context
    let instr = parse(json!({"action": "set_var", "var": null}));
    assert!(matches!(instr, Instruction::SetVar { var: None, .. }));

    // var_ref + top-level default
    let instr = parse(json!({
        "action": "set_var",
        "var": "x",
        "input": {"var_ref": "y"},
        "default": "fallback"
    }));
    match instr {
        Instruction::SetVar { input, default, .. } => {
            assert_eq!(input.unwrap().var_ref.as_deref(), Some("y"));
            assert_eq!(default, Some(json!("fallback")));
        }
        other => panic!("wrong instruction: {:?}", other),
    }
}

#[test]
fn set_var_explicit_null_value_is_preserved() {
    // "value": null means "remove the variable" — distinct from absent
    let instr = parse(json!({"action": "set_var", "var": "x", "input": {"value": null}}));
    match instr {
        Instruction::SetVar { input, .. } => {
            assert_eq!(input.unwrap().value, Some(json!(null)));
        }
        other => panic!("wrong instruction: {:?}", other),
    }

    let instr = parse(json!({"action": "set_var", "var": "x", "input": {}}));
    match instr {
        Instruction::SetVar { input, .. } => assert_eq!(input.unwrap().value, None),
        other => panic!("wrong instruction: {:?}", other),
    }
}

#[test]
fn terminate_defaults() {
    let instr = parse(json!({"action": "terminate"}));
    match instr {
        Instruction::Terminate { mode, test, prevent_unload, from_event } => {
            assert_eq!(mode, TerminateMode::Normal);
            assert!(test.is_none());
            assert!(!prevent_unload);
            assert!(!from_event);
        }
        other => panic!("wrong instruction: {:?}", other),
    }

    let instr = parse(json!({"action": "terminate", "mode": "immediate", "test": "{{ done }}"}));
    assert!(matches!(
        instr,
        Instruction::Terminate { mode: TerminateMode::Immediate, test: Some(_), .. }
    ));
}

#[test]
fn throw_event_shape() {
    let instr = parse(json!({
        "action": "throw_event",
        "scope": "lobby",
        "key": "poke",
        "ttl": "60s",
        "delay": "5s",
        "single_consumer": true,
        "payload": {"who": "ada"}
    }));
    match instr {
        Instruction::ThrowEvent { scope, key, ttl, delay, single_consumer, payload, .. } => {
            assert_eq!(scope.as_deref(), Some("lobby"));
            assert_eq!(key, "poke");
            assert_eq!(ttl, Some(json!("60s")));
            assert_eq!(delay, Some(json!("5s")));
            assert!(single_consumer);
            assert_eq!(payload.unwrap()["who"], "ada");
        }
        other => panic!("wrong instruction: {:?}", other),
    }
}

#[test]
fn import_var_as_alias() {
    let instr = parse(json!({
        "action": "import_var",
        "var_name": "brightness",
        "as": "lobby_brightness",
        "scope": "lobby"
    }));
    match instr {
        Instruction::ImportVar { var_name, import_as, scope } => {
            assert_eq!(var_name, "brightness");
            assert_eq!(import_as.as_deref(), Some("lobby_brightness"));
            assert_eq!(scope.as_deref(), Some("lobby"));
        }
        other => panic!("wrong instruction: {:?}", other),
    }
}

#[test]
fn device_instructions_accept_hyphenated_aliases() {
    assert!(matches!(
        parse(json!({"action": "device-wake"})),
        Instruction::DeviceWake
    ));
    assert!(matches!(
        parse(json!({"action": "device_media_sync"})),
        Instruction::DeviceMediaSync
    ));
    assert!(matches!(
        parse(json!({"action": "device-media-sync"})),
        Instruction::DeviceMediaSync
    ));
    // sleep is the historical alias for device_sleep
    assert!(matches!(
        parse(json!({"action": "sleep"})),
        Instruction::DeviceSleep
    ));
}

#[test]
fn reason_shape() {
    let instr = parse(json!({
        "action": "reason",
        "reasoner": "curator",
        "text_input": "pick an image",
        "output_vars": ["choice", "why"],
        "history_var": "reason_log"
    }));
    match instr {
        Instruction::Reason { reasoner, output_vars, history_var, .. } => {
            assert_eq!(reasoner.as_deref(), Some("curator"));
            assert_eq!(output_vars, vec!["choice", "why"]);
            assert_eq!(history_var.as_deref(), Some("reason_log"));
        }
        other => panic!("wrong instruction: {:?}", other),
    }
}

#[test]
fn unknown_action_is_rejected() {
    let res: Result<Instruction, _> =
        serde_json::from_value(json!({"action": "frobnicate"}));
    assert!(res.is_err());
}

#[test]
fn kind_matches_wire_tag() {
    assert_eq!(parse(json!({"action": "unload"})).kind(), "unload");
    assert_eq!(
        parse(json!({"action": "wait", "duration": "5m"})).kind(),
        "wait"
    );
    assert_eq!(parse(json!({"action": "device-standby"})).kind(), "device_standby");
}
