//! Integration tests for board loading and footprint cross-referencing

use kihier::model::TrackKind;
use kihier::prelude::*;
use kihier::{LoadError, LoadStats, ParserKind, StructuralInconsistency};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn demo_project() -> Project {
    KihierCore::load_project(
        &fixture_path("demo/demo.kicad_sch"),
        &fixture_path("demo/demo.kicad_pcb"),
        &LoadOptions::default(),
    )
    .expect("demo project should load")
}

/// Copy the demo schematics next to a modified board
fn demo_with_board(dir: &Path, edit: impl Fn(String) -> String) -> PathBuf {
    for name in ["demo.kicad_sch", "amp.kicad_sch"] {
        fs::copy(fixture_path(&format!("demo/{}", name)), dir.join(name)).unwrap();
    }
    let board = fs::read_to_string(fixture_path("demo/demo.kicad_pcb")).unwrap();
    fs::write(dir.join("demo.kicad_pcb"), edit(board)).unwrap();
    dir.join("demo.kicad_pcb")
}

#[test]
fn test_demo_board_items() {
    let board = KihierCore::read_board(&fixture_path("demo/demo.kicad_pcb"), &LoadOptions::default())
        .unwrap();

    assert_eq!(board.filename, "demo.kicad_pcb");
    assert_eq!(board.version, "20240108");
    assert_eq!(board.layers.len(), 7);
    assert_eq!(board.copper_layers().count(), 2);
    assert_eq!(board.layer("B.SilkS").and_then(|l| l.user_name.as_deref()), Some("B.Silkscreen"));
    assert_eq!(board.nets.len(), 4);
    assert_eq!(board.net_name(1), Some("GND"));

    assert_eq!(board.footprints.len(), 6);
    assert_eq!(board.tracks.len(), 3);
    assert_eq!(board.tracks.iter().filter(|t| t.locked).count(), 1);
    assert!(board
        .tracks
        .iter()
        .any(|t| matches!(t.kind, TrackKind::Arc { mid } if mid.x == 109.0 && mid.y == 49.5)));
    assert_eq!(board.vias.len(), 1);
    assert_eq!(board.vias[0].layers, vec!["F.Cu", "B.Cu"]);

    let zone = &board.zones[0];
    assert_eq!(zone.net_name, "GND");
    assert_eq!(zone.layers.len(), 2);
    assert_eq!(zone.outline.len(), 4);
}

#[test]
fn test_footprints_link_to_components() {
    let project = demo_project();

    let u1 = project.footprint_of("U1").unwrap();
    assert_eq!(u1.reference, "U1");
    assert_eq!(u1.orientation, 90.0);
    assert_eq!(
        u1.symbol_path.as_ref().map(|p| p.len()),
        Some(3),
        "symbol path should include the root uuid"
    );
    assert_eq!(project.component_of(u1).unwrap().reference.to_string(), "U1");

    let r2 = project.footprint_of("R2").unwrap();
    assert_eq!(r2.component.as_ref().map(|c| c.to_string()).as_deref(), Some("R2"));

    // A root sheet symbol's footprint path omits the root uuid
    let j1 = project.footprint_of("J1").unwrap();
    assert!(j1.is_flipped());
    assert_eq!(j1.layer, "B.Cu");
    assert_eq!(j1.symbol_path.as_ref().unwrap().first(), Some(project.root_path().first().unwrap()));

    assert!(project.footprint_of("#PWR01").is_none());
}

#[test]
fn test_board_only_footprints_are_not_linked() {
    let project = demo_project();

    let holes: Vec<&Footprint> = project.board_only_footprints().collect();
    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0].reference, "H1");
    assert!(holes[0].locked);
    assert!(holes[0].component.is_none());
    assert!(holes[0].symbol_path.is_none());
    assert!(project.component_of(holes[0]).is_none());

    let stats = LoadStats::of_project(&project);
    assert_eq!(stats.footprints, 6);
    assert_eq!(stats.board_only, 1);
    assert_eq!(stats.components, 6);
}

#[test]
fn test_project_loads_from_directory() {
    let project = KihierCore::load_project_dir(&fixture_path("demo"), &LoadOptions::default()).unwrap();
    assert_eq!(project.project_name(), "demo");
    assert_eq!(project.footprints().count(), 6);
}

#[test]
fn test_parsers_agree_on_project() {
    let load = |parser| {
        KihierCore::load_project(
            &fixture_path("demo/demo.kicad_sch"),
            &fixture_path("demo/demo.kicad_pcb"),
            &LoadOptions::default().with_parser(parser),
        )
        .unwrap()
    };
    assert_eq!(load(ParserKind::Reference), load(ParserKind::Batched));
}

#[test]
fn test_unmatched_footprint_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let board = demo_with_board(dir.path(), |text| {
        text.replace(
            "(path \"/20000000-0000-4000-8000-000000000002/50000000-0000-4000-8000-000000000001\")",
            "(path \"/20000000-0000-4000-8000-000000000009/50000000-0000-4000-8000-000000000001\")",
        )
    });

    let err = kihier::loader::load_project(&dir.path().join("demo.kicad_sch"), &board, &LoadOptions::default())
        .unwrap_err();
    match err {
        LoadError::Structural(StructuralInconsistency::UnmatchedFootprint { reference, path }) => {
            assert_eq!(reference, "R2");
            assert!(path.unwrap().starts_with("/20000000-0000-4000-8000-000000000009"));
        }
        other => panic!("expected unmatched footprint, got {:?}", other),
    }
}

#[test]
fn test_second_footprint_for_component_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    // Point R2's footprint at R1's symbol
    let board = demo_with_board(dir.path(), |text| {
        text.replace(
            "(path \"/20000000-0000-4000-8000-000000000002/50000000-0000-4000-8000-000000000001\")",
            "(path \"/20000000-0000-4000-8000-000000000001/50000000-0000-4000-8000-000000000001\")",
        )
    });

    let err = kihier::loader::load_project(&dir.path().join("demo.kicad_sch"), &board, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Structural(StructuralInconsistency::DuplicateFootprint { ref designator, .. })
            if designator == "R1"
    ));
}

#[test]
fn test_legacy_module_syntax() {
    let mut file = tempfile::Builder::new().suffix(".kicad_pcb").tempfile().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"(kicad_pcb (version 20211014) (generator pcbnew)
  (layers (0 F.Cu signal) (31 B.Cu signal))
  (net 0 "") (net 1 GND)
  (module Resistor_SMD:R_0805 locked (layer B.Cu) (tstamp 6f0c4c52-61f6-4a6a-9d0e-3f6a1c2b0001)
    (at 10 20 270)
    (fp_text reference R5 (at 0 -1.65 90) (layer B.SilkS))
    (fp_text value 4k7 (at 0 1.65 90) (layer B.Fab))
    (path /6f0c4c52-61f6-4a6a-9d0e-3f6a1c2b0002))
  (segment (start 1 2) (end 3 4) (width 0.25) (layer F.Cu) (net GND) (tstamp 6f0c4c52-61f6-4a6a-9d0e-3f6a1c2b0003)))
"#,
    )
    .unwrap();

    let board = KihierCore::read_board(file.path(), &LoadOptions::default()).unwrap();
    let footprint = &board.footprints[0];
    assert_eq!(footprint.reference, "R5");
    assert_eq!(footprint.value, "4k7");
    assert_eq!(footprint.orientation, 270.0);
    assert_eq!(footprint.layer, "B.Cu");
    assert!(footprint.locked);
    // Nets referenced by name resolve to their number
    assert_eq!(board.tracks[0].net, 1);
}
