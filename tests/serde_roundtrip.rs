use egui::{Color32, Pos2};
use egui_casegraph::{
    Edge, Filter, KindStyle, Node, NodeId, PathResult, Selection, SettingsRender,
    SettingsSimulation, SettingsStyle,
};
use serde_json::json;

#[test]
fn test_serialize_deserialize_node() {
    let node = Node::new("person:1", "person")
        .with_label("Alice")
        .with_location(Pos2::new(10.0, -4.0))
        .with_pinned(Pos2::new(10.0, -4.0))
        .with_property("email", json!("alice@example.com"));
    let json = serde_json::to_string(&node).expect("serialize node");
    let node2: Node = serde_json::from_str(&json).expect("deserialize node");

    assert_eq!(node2, node);
    assert_eq!(node2.properties()["email"], json!("alice@example.com"));
}

#[test]
fn test_node_ids_serialize_as_plain_strings() {
    let json = serde_json::to_value(NodeId::from("domain:example.org")).unwrap();
    assert_eq!(json, json!("domain:example.org"));
}

#[test]
fn test_node_derived_fields_default_when_missing() {
    let node: Node = serde_json::from_value(json!({
        "id": "n",
        "location": null,
        "pinned": null,
        "kind": "ip",
        "label": "10.0.0.1",
    }))
    .expect("deserialize minimal node");
    assert_eq!(node.neighbor_count(), 0);
    assert!(!node.collapsed());
    assert!(!node.hidden());
}

#[test]
fn test_serialize_deserialize_edge() {
    let edge = Edge::new("e1", "a", "b")
        .with_label("owns")
        .with_property("since", json!(2019));
    let json = serde_json::to_string(&edge).expect("serialize edge");
    let edge2: Edge = serde_json::from_str(&json).expect("deserialize edge");
    assert_eq!(edge2, edge);
    assert_eq!(edge2.label(), Some("owns"));
}

#[test]
fn test_selection_and_filter_roundtrip() {
    let sel = Selection::new(Some(NodeId::from("b")), [NodeId::from("a"), NodeId::from("b")]);
    let sel2: Selection = serde_json::from_str(&serde_json::to_string(&sel).unwrap()).unwrap();
    assert_eq!(sel2, sel);

    let filter = Filter::excluding(["ip", "hash"]);
    let filter2: Filter = serde_json::from_str(&serde_json::to_string(&filter).unwrap()).unwrap();
    assert_eq!(filter2, filter);
    assert!(filter2.is_excluded("hash"));
}

#[test]
fn test_path_result_roundtrip() {
    let path = PathResult {
        nodes: vec!["a".into(), "b".into()],
        edges: vec!["ab".into()],
    };
    let path2: PathResult = serde_json::from_str(&serde_json::to_string(&path).unwrap()).unwrap();
    assert_eq!(path2, path);
}

#[test]
fn test_settings_roundtrip_and_partial_input() {
    let style = SettingsStyle::default().with_kind(
        "person",
        KindStyle {
            color: Color32::from_rgb(0x3b, 0x82, 0xf6),
            icon: Some("person".to_string()),
        },
    );
    let style2: SettingsStyle =
        serde_json::from_str(&serde_json::to_string(&style).unwrap()).unwrap();
    assert_eq!(style2, style);

    let sim: SettingsSimulation =
        serde_json::from_value(json!({ "cooldown_ticks": 50 })).expect("partial settings");
    assert_eq!(sim.cooldown_ticks, 50);
    assert_eq!(sim.alpha_decay, SettingsSimulation::default().alpha_decay);

    let render: SettingsRender = serde_json::from_value(json!({})).unwrap();
    assert_eq!(render, SettingsRender::default());
}
