//! Print a schematic's sheet tree with the components placed on each sheet.

use kihier::prelude::*;
use std::path::Path;

fn print_sheet(schematic: &Schematic, sheet: &SheetInstance) {
    let indent = "  ".repeat(sheet.depth());
    println!(
        "{}{} [{}] page {}",
        indent,
        if sheet.is_root() { schematic.project_name() } else { sheet.name.as_str() },
        sheet.definition,
        sheet.page
    );

    let mut components: Vec<&ComponentInstance> = schematic
        .components()
        .filter(|c| c.sheet() == sheet.path)
        .collect();
    components.sort_by(|a, b| a.reference.cmp(&b.reference));
    for component in components {
        println!("{}  - {} {}", indent, component.reference, component.value);
    }

    for child in schematic.children(&sheet.path) {
        print_sheet(schematic, child);
    }
}

fn main() -> Result<(), KihierError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/demo/demo.kicad_sch".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example print_hierarchy [path/to/root.kicad_sch]");
        std::process::exit(1);
    }

    let schematic = kihier::load_schematic(path)?;
    if let Some(root) = schematic.root_instance() {
        print_sheet(&schematic, root);
    }
    Ok(())
}
