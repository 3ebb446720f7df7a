//! kihier CLI - inspect hierarchical KiCad designs and replicate sheet layouts.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use kihier::clone::{BoardEdit, SimulatedBoard};
use kihier::prelude::*;
use kihier::{
    discover_project_files, CloneOptions, ClonePlan, Command, LoadStats, ParserKind,
    PlacementStrategy, Replicator,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "kihier")]
#[command(about = "Hierarchical KiCad design inspection and layout replication", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output on stderr (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// S-expression parser to use
    #[arg(long, value_enum, default_value = "batched", global = true)]
    parser: ParserChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single KiCad file and report its node tree
    Parse {
        /// Path to any .kicad_sch or .kicad_pcb file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the parsed tree back as s-expressions
        #[arg(long)]
        print: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show the sheet hierarchy of a design
    Tree {
        /// Root .kicad_sch file or project directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List components, with footprint placements when a board is loaded
    Components {
        /// Root .kicad_sch file or project directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Board file to cross-reference
        #[arg(long, value_name = "FILE")]
        board: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Load a design and report structural problems
    Check {
        /// Root .kicad_sch file or project directory
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Board file to cross-reference
        #[arg(long, value_name = "FILE")]
        board: Option<PathBuf>,

        /// Project whose instance data is read (defaults to the root file stem)
        #[arg(long)]
        project: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Replicate the placement around an anchor footprint onto the other
    /// instances of its sheet (dry run on a simulated board)
    Clone {
        /// Project directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Designator of the anchor footprint, e.g. U1
        #[arg(value_name = "ANCHOR")]
        anchor: String,

        /// Sheets above the anchor's own sheet where the reference subtree starts
        #[arg(long, default_value_t = 0)]
        up_levels: usize,

        /// Sheet instance path to update (repeatable; default: all peers)
        #[arg(long = "target", value_name = "PATH")]
        targets: Vec<String>,

        /// Lay targets out on a grid with this many columns instead of
        /// keeping their relative placement
        #[arg(long, value_name = "COLUMNS")]
        grid: Option<usize>,

        /// Grid column spacing in mm
        #[arg(long, default_value_t = 20.0)]
        spacing_x: f64,

        /// Grid row spacing in mm
        #[arg(long, default_value_t = 20.0)]
        spacing_y: f64,

        /// Group each target's footprints
        #[arg(long)]
        group: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParserChoice {
    Reference,
    Batched,
}

impl From<ParserChoice> for ParserKind {
    fn from(choice: ParserChoice) -> Self {
        match choice {
            ParserChoice::Reference => ParserKind::Reference,
            ParserChoice::Batched => ParserKind::Batched,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, 2) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let options = LoadOptions::default().with_parser(cli.parser.into());

    let result = match cli.command {
        Commands::Parse {
            file,
            print,
            format,
        } => handle_parse(&file, print, &options, format),
        Commands::Tree { path, format } => handle_tree(&path, &options, format),
        Commands::Components {
            path,
            board,
            format,
        } => handle_components(&path, board, &options, format),
        Commands::Check {
            path,
            board,
            project,
            format,
        } => {
            let options = match project {
                Some(name) => options.with_project_name(name),
                None => options,
            };
            handle_check(&path, board, &options, format)
        }
        Commands::Clone {
            dir,
            anchor,
            up_levels,
            targets,
            grid,
            spacing_x,
            spacing_y,
            group,
            format,
        } => {
            let strategy = match grid {
                Some(columns) => PlacementStrategy::Grid {
                    columns,
                    spacing_x,
                    spacing_y,
                },
                None => PlacementStrategy::Relative,
            };
            targets
                .iter()
                .map(|t| t.parse::<EntityPath>().with_context(|| format!("invalid sheet path '{}'", t)))
                .collect::<anyhow::Result<Vec<_>>>()
                .and_then(|targets| {
                    let clone_options = CloneOptions {
                        up_levels,
                        targets,
                        strategy,
                        group,
                    };
                    handle_clone(&dir, &anchor, clone_options, &options, format)
                })
        }
    };

    let exit_code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    process::exit(exit_code);
}

/// A loaded design, with or without its board
enum Design {
    Schematic(Schematic),
    Project(Project),
}

impl Design {
    fn schematic(&self) -> &Schematic {
        match self {
            Design::Schematic(schematic) => schematic,
            Design::Project(project) => project.schematic(),
        }
    }

    fn project(&self) -> Option<&Project> {
        match self {
            Design::Schematic(_) => None,
            Design::Project(project) => Some(project),
        }
    }

    fn stats(&self) -> LoadStats {
        match self {
            Design::Schematic(schematic) => LoadStats::of_schematic(schematic),
            Design::Project(project) => LoadStats::of_project(project),
        }
    }
}

/// Load `path` as a root schematic, or discover the project files when it
/// is a directory. A board found next to the root is cross-referenced.
fn load_design(path: &Path, board: Option<PathBuf>, options: &LoadOptions) -> anyhow::Result<Design> {
    let (schematic, board) = if path.is_dir() {
        let files = discover_project_files(path)?;
        (files.schematic, board.or(files.board))
    } else {
        (path.to_path_buf(), board)
    };

    let design = match board {
        Some(board) => Design::Project(KihierCore::load_project(&schematic, &board, options)?),
        None => Design::Schematic(KihierCore::load_schematic(&schematic, options)?),
    };
    Ok(design)
}

fn handle_parse(file: &Path, print: bool, options: &LoadOptions, format: OutputFormat) -> anyhow::Result<()> {
    let root = KihierCore::parse_file(file, options.parser)?;
    let document = root
        .children()
        .first()
        .context("parsed file holds no document")?;

    match format {
        OutputFormat::Human => {
            println!(
                "{}: ({}) {} nodes [{:?} parser]",
                file.display(),
                document.key(),
                root.count() - 1,
                options.parser
            );
            if print {
                println!("{}", root);
            }
        }
        OutputFormat::Json => {
            let mut output = serde_json::json!({
                "file": file.display().to_string(),
                "key": document.key(),
                "nodes": root.count() - 1,
                "parser": options.parser,
            });
            if print {
                output["tree"] = serde_json::to_value(document)?;
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn handle_tree(path: &Path, options: &LoadOptions, format: OutputFormat) -> anyhow::Result<()> {
    let design = load_design(path, None, options)?;
    let schematic = design.schematic();
    let root = schematic
        .root_instance()
        .context("schematic has no root sheet instance")?;

    match format {
        OutputFormat::Human => print_sheet(schematic, root),
        OutputFormat::Json => {
            let sheets: Vec<&SheetInstance> = schematic.descendants(&root.path).collect();
            let output = serde_json::json!({
                "project": schematic.project_name(),
                "root": schematic.root_path().to_string(),
                "sheets": sheets,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_sheet(schematic: &Schematic, sheet: &SheetInstance) {
    let indent = "  ".repeat(sheet.depth());
    let name = if sheet.is_root() {
        schematic.project_name()
    } else {
        sheet.name.as_str()
    };
    println!("{}{} [{}] page {}", indent, name, sheet.definition, sheet.page);
    for child in schematic.children(&sheet.path) {
        print_sheet(schematic, child);
    }
}

fn handle_components(
    path: &Path,
    board: Option<PathBuf>,
    options: &LoadOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let design = load_design(path, board, options)?;
    let mut components: Vec<&ComponentInstance> = design.schematic().components().collect();
    components.sort_by(|a, b| a.reference.cmp(&b.reference));
    let footprint_of = |component: &ComponentInstance| {
        design
            .project()
            .zip(component.footprint)
            .and_then(|(project, id)| project.footprint(id))
    };

    match format {
        OutputFormat::Human => {
            for component in components {
                let placement = footprint_of(component)
                    .map(|f| {
                        format!(
                            "  {} ({}, {}) {}°",
                            f.layer, f.position.x, f.position.y, f.orientation
                        )
                    })
                    .unwrap_or_default();
                println!(
                    "{:<8} {:<12} {:<36} {}{}",
                    component.reference.to_string(),
                    component.value,
                    component.lib_id,
                    component.sheet(),
                    placement
                );
            }
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = components
                .iter()
                .map(|component| {
                    serde_json::json!({
                        "reference": component.reference,
                        "value": component.value,
                        "lib_id": component.lib_id,
                        "sheet": component.sheet().to_string(),
                        "dnp": component.dnp,
                        "footprint": footprint_of(component),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn handle_check(
    path: &Path,
    board: Option<PathBuf>,
    options: &LoadOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match load_design(path, board, options) {
        Ok(design) => {
            let stats = design.stats();
            match format {
                OutputFormat::Human => {
                    println!("\nDesign: {}", path.display());
                    println!("{}", "─".repeat(60));
                    println!("  No issues found");
                    println!("\n  Summary:");
                    println!("    Sheet files:     {}", stats.sheet_files);
                    println!("    Sheet instances: {}", stats.sheet_instances);
                    println!("    Symbols:         {}", stats.symbols);
                    println!("    Components:      {}", stats.components);
                    if design.project().is_some() {
                        println!("    Footprints:      {}", stats.footprints);
                        println!("    Board only:      {}", stats.board_only);
                    }
                }
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "path": path.display().to_string(),
                        "ok": true,
                        "stats": stats,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
            Ok(())
        }
        Err(e) => {
            if let OutputFormat::Json = format {
                let output = serde_json::json!({
                    "path": path.display().to_string(),
                    "ok": false,
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            Err(e)
        }
    }
}

fn handle_clone(
    dir: &Path,
    anchor: &str,
    clone_options: CloneOptions,
    options: &LoadOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let project = match load_design(dir, None, options)? {
        Design::Project(project) => project,
        Design::Schematic(_) => bail!("no board file found for {}", dir.display()),
    };

    let mut board = SimulatedBoard::from_board(project.board());
    let (plan, _applied) = Replicator::new(&project, clone_options).run(anchor, &mut board)?;

    match format {
        OutputFormat::Human => print_plan(&project, &plan, &board),
        OutputFormat::Json => {
            let moved: Vec<serde_json::Value> = moved_items(&plan)
                .into_iter()
                .filter_map(|id| board.item(id).map(|item| (id, item)))
                .map(|(id, item)| {
                    serde_json::json!({
                        "id": id.to_string(),
                        "reference": item.reference,
                        "placement": item.placement,
                    })
                })
                .collect();
            let output = serde_json::json!({
                "anchor": plan.anchor,
                "reference": plan.reference.to_string(),
                "targets": plan.targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "commands": plan.commands.records(),
                "placements": moved,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Footprints touched by a plan, in first-touched order
fn moved_items(plan: &ClonePlan) -> Vec<EntityPathComponent> {
    let mut items = Vec::new();
    for command in plan.commands.commands() {
        let item = match command {
            Command::MoveToLayer { item, .. }
            | Command::Move { item, .. }
            | Command::Rotate { item, .. }
            | Command::Flip { item, .. }
            | Command::SetPlacement { item, .. } => *item,
            _ => continue,
        };
        if !items.contains(&item) {
            items.push(item);
        }
    }
    items
}

fn designator(project: &Project, id: EntityPathComponent) -> String {
    project
        .footprint(id)
        .map(|f| f.reference.clone())
        .unwrap_or_else(|| id.to_string())
}

fn describe(project: &Project, command: &Command) -> String {
    match command {
        Command::MoveToLayer { item, layer } => format!("move {} to {}", designator(project, *item), layer),
        Command::Move { item, delta } => {
            format!("move {} by ({}, {})", designator(project, *item), delta.x, delta.y)
        }
        Command::Rotate {
            item,
            center,
            angle,
        } => format!(
            "rotate {} by {}° around ({}, {})",
            designator(project, *item),
            angle,
            center.x,
            center.y
        ),
        Command::Flip { item, center } => format!(
            "flip {} around ({}, {})",
            designator(project, *item),
            center.x,
            center.y
        ),
        Command::SetPlacement { item, placement } => format!(
            "place {} on {} at ({}, {}) {}°",
            designator(project, *item),
            placement.layer,
            placement.position.x,
            placement.position.y,
            placement.orientation
        ),
        Command::Clone { source, copy } => format!("clone {} as {}", designator(project, *source), copy),
        Command::Remove { item } => format!("remove {}", designator(project, *item)),
        Command::Restore { item } => format!("restore {}", designator(project, *item)),
        Command::Group { group, items } => format!("group {} items as {}", items.len(), group),
        Command::Ungroup { group } => format!("ungroup {}", group),
    }
}

fn print_plan(project: &Project, plan: &ClonePlan, board: &SimulatedBoard) {
    println!("Anchor:    {}", plan.anchor);
    println!("Reference: {}", plan.reference);
    println!("Targets:");
    for target in &plan.targets {
        println!("  {}", target);
    }

    println!("\nCommands:");
    if plan.commands.is_empty() {
        println!("  (none, targets already match)");
    }
    for command in plan.commands.commands() {
        println!("  {}", describe(project, command));
    }

    println!("\nResulting placements:");
    for id in moved_items(plan) {
        if let Ok(placement) = board.placement(id) {
            println!(
                "  {:<8} {} ({}, {}) {}°",
                designator(project, id),
                placement.layer,
                placement.position.x,
                placement.position.y,
                placement.orientation
            );
        }
    }
}
