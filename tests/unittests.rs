

use std::path::Path;

use egui::{pos2, vec2};

use ifc_scope::api::{self, ParseResponse};
use ifc_scope::gui::panel::PanelController;
use ifc_scope::scene::annotations::AnnotationStore;
use ifc_scope::scene::catalog::{Element, ElementCatalog, PropertyValue};
use ifc_scope::scene::selection::{SelectionEntry, SelectionManager};
use ifc_scope::scene::visibility::VisibilityManager;

fn element(type_name: &str, global_id: &str, name: Option<&str>) -> Element {
    Element {
        type_name: type_name.to_string(),
        global_id: global_id.to_string(),
        name: name.map(str::to_string),
        position: None,
        placement_matrix: None,
        properties: None,
    }
}

fn entry(express_id: u64, name: &str, type_name: &str) -> SelectionEntry {
    SelectionEntry {
        express_id,
        name: name.to_string(),
        type_name: type_name.to_string(),
        fragment_id: None,
    }
}

fn wall_door_catalog() -> ElementCatalog {
    let mut catalog = ElementCatalog::new();
    catalog.load(vec![
        element("Wall", "w1", Some("North wall")),
        element("Wall", "w2", None),
        element("Wall", "w3", None),
        element("Door", "d1", Some("Entrance")),
    ]);
    catalog
}

#[test]
fn catalog_counts_group_by_type_and_default_unknown() {
    let mut catalog = ElementCatalog::new();
    catalog.load(vec![
        element("Wall", "w1", None),
        element("Wall", "w2", None),
        element("", "x1", None),
    ]);
    let counts = catalog.type_counts();
    assert_eq!(counts.get("Wall"), Some(&2));
    // Elements without a type name are grouped as Unknown
    assert_eq!(counts.get("Unknown"), Some(&1));
    assert_eq!(counts.len(), 2);
}

#[test]
fn catalog_load_replaces_and_clear_empties() {
    let mut catalog = wall_door_catalog();
    assert_eq!(catalog.len(), 4);
    catalog.load(vec![element("Beam", "b1", None)]);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.type_counts().get("Wall"), None);
    catalog.clear();
    assert!(catalog.is_empty());
    assert!(catalog.type_counts().is_empty());
}

#[test]
fn catalog_preview_collapses_remainder() {
    let mut catalog = ElementCatalog::new();
    let elements: Vec<Element> = (0..12).map(|i| element("Wall", &format!("w{}", i), None)).collect();
    catalog.load(elements);
    let (shown, rest) = catalog.preview(10);
    assert_eq!(shown.len(), 10);
    assert_eq!(rest, 2);

    catalog.load((0..10).map(|i| element("Wall", &format!("w{}", i), None)).collect());
    let (shown, rest) = catalog.preview(10);
    assert_eq!(shown.len(), 10);
    assert_eq!(rest, 0, "remainder collapses to 0 at the limit");

    catalog.load(vec![element("Wall", "w0", None)]);
    let (shown, rest) = catalog.preview(10);
    assert_eq!(shown.len(), 1);
    assert_eq!(rest, 0);
}

#[test]
fn visibility_seed_preserves_overrides() {
    let mut visibility = VisibilityManager::new();
    let catalog = wall_door_catalog();
    visibility.seed(&catalog.type_counts());
    assert!(visibility.is_visible("Wall"));
    assert!(visibility.is_visible("Door"));

    visibility.set_visible("Door", false);
    let mut reloaded = ElementCatalog::new();
    reloaded.load(vec![
        element("Door", "d1", None),
        element("Window", "n1", None),
    ]);
    visibility.seed(&reloaded.type_counts());
    // Existing override survives, only the new key is inserted
    assert!(!visibility.is_visible("Door"));
    assert!(visibility.is_visible("Window"));
}

#[test]
fn visibility_reset_replaces_whole_mapping() {
    let mut visibility = VisibilityManager::new();
    visibility.seed(&wall_door_catalog().type_counts());
    visibility.set_visible("Door", false);

    let mut catalog = ElementCatalog::new();
    catalog.load(vec![element("Door", "d1", None), element("Slab", "s1", None)]);
    visibility.reset_from(&catalog.type_counts());
    // Reload replaces: override gone, key set is exactly the new catalog's
    assert!(visibility.is_visible("Door"));
    assert!(visibility.is_visible("Slab"));
    let keys: Vec<&str> = visibility.flags().keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["Door", "Slab"]);
}

#[test]
fn visibility_show_hide_all_keep_key_set() {
    let mut visibility = VisibilityManager::new();
    visibility.seed(&wall_door_catalog().type_counts());
    let before: Vec<String> = visibility.flags().keys().cloned().collect();

    visibility.show_all();
    visibility.hide_all();
    assert!(visibility.flags().values().all(|v| !v));
    let after: Vec<String> = visibility.flags().keys().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn visibility_fail_open_and_unknown_insert() {
    let mut visibility = VisibilityManager::new();
    // Absent keys read as visible by convention
    assert!(visibility.is_visible("Ghost"));
    // Direct mutation of an unknown type simply inserts it
    visibility.set_visible("Ghost", false);
    assert!(!visibility.is_visible("Ghost"));
    assert_eq!(visibility.flags().len(), 1);
}

#[test]
fn selection_rejects_duplicates_and_keeps_order() {
    let mut selection = SelectionManager::new();
    selection.add(entry(1, "Wall A", "Wall"));
    selection.add(entry(2, "Door B", "Door"));
    selection.add(entry(1, "Wall A again", "Wall"));
    assert_eq!(selection.len(), 2);
    let ids: Vec<u64> = selection.entries().iter().map(|e| e.express_id).collect();
    assert_eq!(ids, vec![1, 2]);
    // First add wins; the duplicate did not overwrite the stored entry
    assert_eq!(selection.entries()[0].name, "Wall A");

    selection.remove(1);
    assert!(!selection.contains(1));
    assert!(selection.contains(2));
    // Removing an absent id is a no-op
    selection.remove(99);
    assert_eq!(selection.len(), 1);
    assert_eq!(selection.current().map(|e| e.express_id), Some(2));
}

#[test]
fn selection_isolation_rules() {
    let mut selection = SelectionManager::new();
    // Isolating an empty selection is a no-op
    selection.isolate();
    assert!(!selection.is_isolated());

    selection.add(entry(1, "Wall A", "Wall"));
    selection.isolate();
    assert!(selection.is_isolated());

    // Emptying the set does not exit isolation on its own
    selection.remove(1);
    assert!(selection.is_empty());
    assert!(selection.is_isolated());

    // clear() leaves the flag alone too
    selection.add(entry(2, "Door B", "Door"));
    selection.clear();
    assert!(selection.is_isolated());

    // unisolate is always effective
    selection.unisolate();
    assert!(!selection.is_isolated());
}

#[test]
fn annotations_reject_blank_text() {
    let mut store = AnnotationStore::new();
    assert!(store.add("  ", None, None).is_none());
    assert!(store.add("", None, None).is_none());
    assert!(store.add("\n\t", None, None).is_none());
    assert_eq!(store.len(), 0);
}

#[test]
fn annotations_filter_narrows_never_widens() {
    let mut store = AnnotationStore::new();
    store.add("note", Some("E1"), Some("Wall"));
    store.add("general remark", None, None);
    store.add("other element", Some("E2"), None);

    let scoped = store.filter_by_element(Some("E1"));
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].text, "note");
    assert_eq!(scoped[0].element_name.as_deref(), Some("Wall"));

    // No filter: everything, general and scoped alike
    let all = store.filter_by_element(None);
    assert_eq!(all.len(), 3);

    assert!(store.filter_by_element(Some("E3")).is_empty());
}

#[test]
fn annotations_counts_always_sum_to_total() {
    let mut store = AnnotationStore::new();
    let counts = store.counts();
    assert_eq!(counts.general + counts.scoped, 0);

    store.add("a", None, None);
    store.add("b", Some("E1"), None);
    store.add("c", Some("E1"), Some("Wall"));
    store.add("d", None, None);
    let counts = store.counts();
    assert_eq!(counts.general, 2);
    assert_eq!(counts.scoped, 2);
    assert_eq!(counts.general + counts.scoped, store.len());

    let id = store.comments()[1].id.clone();
    store.delete(&id);
    let counts = store.counts();
    assert_eq!(counts.general + counts.scoped, store.len());
}

#[test]
fn annotations_delete_is_idempotent() {
    let mut store = AnnotationStore::new();
    store.add("keep me", None, None);
    let id = store.comments()[0].id.clone();

    // Unknown ids silently succeed
    store.delete("no-such-id");
    assert_eq!(store.len(), 1);

    store.delete(&id);
    assert_eq!(store.len(), 0);
    store.delete(&id);
    assert_eq!(store.len(), 0);
}

#[test]
fn annotations_store_trimmed_text_and_fresh_ids() {
    let mut store = AnnotationStore::new();
    let first = store.add("  padded note  ", None, None).unwrap().id.clone();
    assert_eq!(store.comments()[0].text, "padded note");
    let second = store.add("another", None, None).unwrap().id.clone();
    assert_ne!(first, second);
}

#[test]
fn panel_drag_offset_math() {
    // Panel at (100,100); pointer-down on the handle at (110,105)
    let mut panel = PanelController::new(pos2(100.0, 100.0));
    assert!(!panel.is_dragging());
    panel.begin_drag(pos2(110.0, 105.0));
    assert!(panel.is_dragging());

    // offset is (10,5); moving to (300,250) puts the panel at (290,245)
    panel.drag_to(pos2(300.0, 250.0));
    assert_eq!(panel.position(), pos2(290.0, 245.0));

    // Position is pure in the pointer: same input, same output
    panel.drag_to(pos2(300.0, 250.0));
    assert_eq!(panel.position(), pos2(290.0, 245.0));

    // Release freezes the position
    panel.end_drag();
    assert!(!panel.is_dragging());
    panel.drag_to(pos2(700.0, 700.0));
    assert_eq!(panel.position(), pos2(290.0, 245.0));
}

#[test]
fn panel_drag_requires_begin_and_end_is_idempotent() {
    let mut panel = PanelController::new(pos2(50.0, 60.0));
    panel.drag_to(pos2(500.0, 500.0));
    assert_eq!(panel.position(), pos2(50.0, 60.0));

    panel.end_drag();
    panel.end_drag();
    assert!(!panel.is_dragging());

    // A second down-event mid-drag keeps the original offset
    panel.begin_drag(pos2(60.0, 70.0));
    panel.begin_drag(pos2(200.0, 200.0));
    panel.drag_to(pos2(61.0, 71.0));
    assert_eq!(panel.position(), pos2(51.0, 61.0));
}

#[test]
fn panel_anchor_is_viewport_relative() {
    let panel = PanelController::anchored_top_right(vec2(1300.0, 710.0), 420.0, 80.0);
    assert_eq!(panel.position(), pos2(880.0, 80.0));
    // Narrow viewports clamp to the left edge instead of going negative
    let narrow = PanelController::anchored_top_right(vec2(300.0, 710.0), 420.0, 16.0);
    assert_eq!(narrow.position(), pos2(0.0, 16.0));
}

#[test]
fn parse_response_wire_format() {
    let body = r#"{
        "elements": [
            {
                "type_name": "IfcWall",
                "global_id": "2O2Fr$t4X7Zf8NOew3FLOH",
                "name": "Wall-001",
                "position": [1.0, 2.0, 0.0],
                "properties": {
                    "LoadBearing": true,
                    "Width": 0.3,
                    "Material": "Concrete",
                    "Pset": {"FireRating": "F90"}
                }
            },
            {"global_id": "3xYz"}
        ],
        "costs": null,
        "element_count": 2,
        "costs_calculated": false
    }"#;
    let parsed: ParseResponse = serde_json::from_str(body).expect("response should parse");
    assert_eq!(parsed.element_count, 2);
    assert!(!parsed.costs_calculated);
    assert!(parsed.costs.is_none());

    let wall = &parsed.elements[0];
    assert_eq!(wall.type_key(), "IfcWall");
    let props = wall.properties.as_ref().unwrap();
    assert_eq!(props.get("LoadBearing"), Some(&PropertyValue::Bool(true)));
    assert_eq!(props.get("Width"), Some(&PropertyValue::Number(0.3)));
    assert_eq!(props.get("Material"), Some(&PropertyValue::Text("Concrete".into())));
    assert!(matches!(props.get("Pset"), Some(PropertyValue::Map(_))));

    // Missing type names group as Unknown
    assert_eq!(parsed.elements[1].type_key(), "Unknown");

    let with_costs = r#"{
        "elements": [],
        "costs": {"summary": {"grand_total": 1250.5, "total_material_cost": 1000.0, "total_connection_cost": 200.5, "total_labor_cost": 50.0}},
        "element_count": 0,
        "costs_calculated": true
    }"#;
    let parsed: ParseResponse = serde_json::from_str(with_costs).unwrap();
    let summary = parsed.costs.unwrap().summary;
    assert_eq!(summary.grand_total, 1250.5);
    assert_eq!(summary.total_labor_cost, 50.0);
}

#[test]
fn ifc_suffix_gate() {
    assert!(api::is_ifc_file(Path::new("model.ifc")));
    assert!(api::is_ifc_file(Path::new("/tmp/projects/building model.ifc")));
    assert!(!api::is_ifc_file(Path::new("model.step")));
    assert!(!api::is_ifc_file(Path::new("model.ifczip")));
    assert!(!api::is_ifc_file(Path::new("model")));
    // Suffix match is exact, as in the upload form
    assert!(!api::is_ifc_file(Path::new("MODEL.IFC")));
}

#[test]
fn load_seed_toggle_flow() {
    // Load a catalog with {Wall: 3, Door: 1}; flags seed all-visible;
    // hiding a type never changes the catalog-derived counts.
    let catalog = wall_door_catalog();
    let mut visibility = VisibilityManager::new();
    visibility.reset_from(&catalog.type_counts());
    assert_eq!(visibility.flags().len(), 2);
    assert!(visibility.is_visible("Wall"));
    assert!(visibility.is_visible("Door"));

    visibility.set_visible("Door", false);
    let counts = catalog.type_counts();
    assert_eq!(counts.get("Wall"), Some(&3));
    assert_eq!(counts.get("Door"), Some(&1));
    assert!(!visibility.is_visible("Door"));
}
