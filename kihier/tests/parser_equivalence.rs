//! The batched parser must build exactly the tree the reference parser builds

use kihier::parser::{self, BatchedParser, ParserKind, ReferenceParser, BATCH_WINDOW};
use kihier::{Node, Selection};
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn kicad_files(dir: &Path, found: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            kicad_files(&path, found);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("kicad_sch") | Some("kicad_pcb")
        ) {
            found.push(path);
        }
    }
}

fn both(text: &str) -> (Result<Node, parser::SyntaxError>, Result<Node, parser::SyntaxError>) {
    let root = vec!["input".to_string()];
    (
        ReferenceParser::new(text).parse(root.clone()),
        BatchedParser::new(text).parse(root),
    )
}

fn assert_same_tree(text: &str) -> Node {
    let (reference, batched) = both(text);
    let reference = reference.unwrap_or_else(|e| panic!("reference parser failed: {}", e));
    let batched = batched.unwrap_or_else(|e| panic!("batched parser failed: {}", e));
    assert_eq!(reference, batched, "trees differ for {:?}", text);
    reference
}

#[test]
fn test_fixture_files_parse_identically() {
    let mut files = Vec::new();
    kicad_files(&fixture_path(""), &mut files);
    assert!(files.len() >= 8, "fixture walk found only {:?}", files);

    for file in files {
        let reference = parser::parse_file_with(&file, ParserKind::Reference, None);
        let batched = parser::parse_file_with(&file, ParserKind::Batched, None);
        match (reference, batched) {
            (Ok(reference), Ok(batched)) => {
                assert_eq!(reference, batched, "trees differ for {}", file.display());
                assert!(reference.count() > 1);
            }
            (Err(_), Err(_)) => {}
            (reference, batched) => panic!(
                "parsers disagree on {}: reference ok = {}, batched ok = {}",
                file.display(),
                reference.is_ok(),
                batched.is_ok()
            ),
        }
    }
}

#[test]
fn test_value_counts_around_batch_window() {
    for count in [0, 1, BATCH_WINDOW - 1, BATCH_WINDOW, BATCH_WINDOW + 1, BATCH_WINDOW * 3] {
        let values: Vec<String> = (0..count).map(|i| format!("v{}", i)).collect();
        let text = format!("(pts {})", values.join(" "));
        let root = assert_same_tree(&text);
        assert_eq!(root.children()[0].values().len(), count);

        // The same values again, followed by a child
        let text = format!("(pts {} (xy 1 2))", values.join(" "));
        let root = assert_same_tree(&text);
        assert_eq!(root.children()[0].children().len(), 1);
    }
}

#[test]
fn test_quoted_and_escaped_values() {
    let root = assert_same_tree(
        "(property \"Value\" \"a \\\"quoted\\\" (paren) word\" \"\" \"tab\\there\" \"back\\\\slash\")",
    );
    let property = &root.children()[0];
    assert_eq!(property.value(0), Some("Value"));
    assert_eq!(property.value(1), Some("a \"quoted\" (paren) word"));
    assert_eq!(property.value(2), Some(""));
    assert_eq!(property.value(3), Some("tab\there"));
    assert_eq!(property.value(4), Some("back\\slash"));
}

#[test]
fn test_deep_nesting_and_whitespace() {
    let depth = 64;
    let mut text = String::new();
    for level in 0..depth {
        text.push_str(&format!("(n{}\r\n\t {} ", level, level));
    }
    text.push_str(&")".repeat(depth));

    let root = assert_same_tree(&text);
    assert_eq!(root.count(), depth + 1);
}

#[test]
fn test_display_output_reparses_identically() {
    let path = fixture_path("demo/amp.kicad_sch");
    let original = parser::parse_file_with(&path, ParserKind::Reference, None).unwrap();
    let printed = original.to_string();

    let reparsed = assert_same_tree(&printed);
    assert_eq!(reparsed.children(), original.children());
}

#[test]
fn test_malformed_inputs_fail_in_both() {
    for text in [
        "(kicad_sch (version 1)",
        "(kicad_sch \"unterminated)",
        "(kicad_sch) (extra)",
        "(Bad key)",
        "value outside",
        "",
    ] {
        let (reference, batched) = both(text);
        assert!(reference.is_err(), "reference accepted {:?}", text);
        assert!(batched.is_err(), "batched accepted {:?}", text);
    }
}

#[test]
fn test_selection_over_parsed_fixture() {
    let root = parser::parse_file(&fixture_path("demo/demo.kicad_sch")).unwrap();
    let doc = Selection::of(&root).children("kicad_sch");

    assert_eq!(doc.child_value("uuid").unwrap(), "10000000-0000-4000-8000-000000000001");

    let sheets = doc.children("sheet");
    assert_eq!(sheets.len(), 2);
    let names: Vec<&str> = sheets
        .iter()
        .map(|sheet| sheet.property("Sheetname").unwrap())
        .collect();
    assert_eq!(names, vec!["Amp A", "Amp B"]);

    let amp_b = sheets.children("property").filter(1, "./amp.kicad_sch");
    assert_eq!(amp_b.len(), 1);
    assert_eq!(amp_b.value_by_index(0).unwrap(), "Sheetfile");

    // Ambiguity is reported rather than resolved
    assert!(sheets.child_value("uuid").is_err());
    assert!(doc.children("no_such_key").single().is_err());
}
