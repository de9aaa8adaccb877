// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config() -> DestinationsConfig {
    DestinationsConfig::from_toml_str(
        r#"
[[destination]]
id = "a"
groups = ["g"]

[[destination]]
id = "b"
groups = ["g"]

[[destination]]
id = "c"
"#,
    )
    .unwrap()
}

#[test]
fn resolves_group_members() {
    let groups = StaticGroups::new(config());
    let members = groups.destinations_of("g");
    assert_eq!(members.len(), 2);
    assert!(groups.is_group("g"));
    assert!(!groups.is_group("c"));
}

#[test]
fn all_destinations_includes_groupless() {
    let groups = StaticGroups::new(config());
    assert_eq!(groups.all_destinations().len(), 3);
    assert_eq!(groups.groups_of(&DestinationId::new("a")), vec!["g"]);
    assert!(groups.groups_of(&DestinationId::new("c")).is_empty());
}
