use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, ValueEnum};

use revision_randomiser::config::{init_default_config, Settings, CONFIG_ENV};
use revision_randomiser::console::ConsoleLog;
use revision_randomiser::dataset::export_dataset;
use revision_randomiser::error::SelectionError;
use revision_randomiser::model::{is_uploaded, Axis, Node};
use revision_randomiser::prefs::PrefsStore;
use revision_randomiser::selection::{AxisToggles, NodePath, PATH_SEPARATOR};
use revision_randomiser::session::Session;
use revision_randomiser::xlsx::template::{write_template_workbook, TEMPLATE_FILE_NAME};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DrawTarget {
    Both,
    Content,
    Function,
}

#[derive(Parser, Debug)]
#[command(name = "revision-randomiser")]
#[command(about = "Flashcard randomiser: pick a random topic and instruction from selected groups", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for revision-randomiser.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset JSON (overrides [data] dataset)
    #[arg(long, value_name = "JSON")]
    dataset: Option<PathBuf>,

    /// Merge an .xlsx upload into the loaded cards (repeatable)
    #[arg(long, value_name = "XLSX")]
    import: Vec<PathBuf>,

    /// Write the example spreadsheet and exit
    #[arg(long, value_name = "XLSX", num_args = 0..=1, default_missing_value = TEMPLATE_FILE_NAME)]
    write_template: Option<PathBuf>,

    /// Write the merged cards (uploads included) as dataset JSON
    #[arg(long, value_name = "JSON")]
    export_json: Option<PathBuf>,

    /// Print both selection trees with their checkbox state
    #[arg(long)]
    list: bool,

    /// Check a content category or topic, e.g. "History > Ancient" (repeatable)
    #[arg(long, value_name = "PATH")]
    content: Vec<String>,

    /// Check a function category or instruction (repeatable)
    #[arg(long, value_name = "PATH")]
    function: Vec<String>,

    /// Check every content box
    #[arg(long)]
    all_content: bool,

    /// Check every function box
    #[arg(long)]
    all_functions: bool,

    /// Draw content only; the instruction card shows its placeholder
    #[arg(long, conflicts_with = "function_only")]
    content_only: bool,

    /// Draw instructions only; the content card shows its placeholder
    #[arg(long)]
    function_only: bool,

    /// Which card(s) to draw
    #[arg(long, value_enum, num_args = 0..=1, default_missing_value = "both")]
    draw: Option<DrawTarget>,

    /// Number of draws
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// RNG seed for reproducible draws (overrides [cards] seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Switch between the dark and light theme and print the new one
    #[arg(long)]
    toggle_theme: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn checkbox(toggles: &AxisToggles, path: &[String]) -> &'static str {
    if toggles.is_checked(path) {
        "[x]"
    } else {
        "[ ]"
    }
}

fn print_node(toggles: &AxisToggles, path: &mut Vec<String>, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Leaves(items) => {
            for item in items {
                path.push(item.clone());
                let eligible = if toggles.is_leaf_eligible(path) { " *" } else { "" };
                println!("{indent}{} {item}{eligible}", checkbox(toggles, path));
                path.pop();
            }
        }
        Node::Category(tree) => {
            for (name, child) in tree.iter() {
                path.push(name.to_string());
                println!("{indent}{} {name}", checkbox(toggles, path));
                print_node(toggles, path, child, depth + 1);
                path.pop();
            }
        }
    }
}

fn print_axis<R: rand::Rng>(session: &Session<R>, axis: Axis) {
    let tree = session.model().tree(axis);
    let toggles = session.selection().axis(axis);
    let all = if session.all_selected(axis) { "[x]" } else { "[ ]" };
    println!("{axis} groups ({all} select all)");

    let (preloaded, uploaded) = session.model().partition(axis);
    for (title, keys) in [("preloaded", preloaded), ("uploaded", uploaded)] {
        if keys.is_empty() {
            continue;
        }
        println!("  {title}:");
        for key in keys {
            let Some(node) = tree.get(key) else { continue };
            let mut path = vec![key.to_string()];
            println!("    {} {key}", checkbox(toggles, &path));
            print_node(toggles, &mut path, node, 3);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let settings =
        Settings::resolve(args.config.clone(), args.dataset.clone(), args.seed, args.quiet)
            .context("load config")?;
    let log = ConsoleLog::new(settings.verbose);
    if let Some(p) = settings.config_path.as_ref() {
        log.info(format!("config: {}", p.display()));
    }

    if let Some(out) = args.write_template.as_ref() {
        write_template_workbook(out).context("write template")?;
        log.info(format!("wrote template: {}", out.display()));
        return Ok(());
    }

    if args.toggle_theme {
        let prefs = PrefsStore::new(settings.prefs_path.clone());
        let theme = prefs.toggle_theme().context("toggle theme")?;
        println!("{}", theme.as_str());
    }

    let wants_session = args.list
        || args.draw.is_some()
        || args.export_json.is_some()
        || !args.import.is_empty();
    if !wants_session {
        if !args.toggle_theme {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  revision-randomiser --all-content --all-functions --draw\n\nTIPS:\n  - Paths use \"{PATH_SEPARATOR}\" between levels, e.g. --content \"History{PATH_SEPARATOR}Ancient\".\n  - Default config search: revision-randomiser.toml (upwards), or set {CONFIG_ENV}.\n"
            );
        }
        return Ok(());
    }

    let mut session = Session::new(settings.placeholders.clone(), settings.seed, log.clone());
    if let Err(err) = session.load_dataset(&settings.dataset_path) {
        if args.import.is_empty() {
            return Err(err).context("load dataset");
        }
        log.warn(format!("{err}; continuing with uploads only"));
    }
    for path in &args.import {
        session
            .import_workbook_path(path)
            .with_context(|| format!("import {}", path.display()))?;
    }

    if let Some(out) = args.export_json.as_ref() {
        export_dataset(session.model(), out).context("export dataset")?;
        log.info(format!("wrote dataset: {}", out.display()));
    }

    if args.all_content {
        session.set_all(Axis::Content, true);
    }
    if args.all_functions {
        session.set_all(Axis::Function, true);
    }
    for (axis, paths) in [(Axis::Content, &args.content), (Axis::Function, &args.function)] {
        for text in paths {
            session
                .set_selection(axis, &NodePath::parse(text), true)
                .with_context(|| format!("select {axis} \"{text}\""))?;
        }
    }
    if args.content_only {
        session.set_only_mode(Axis::Content, true);
    }
    if args.function_only {
        session.set_only_mode(Axis::Function, true);
    }

    if args.list {
        for axis in Axis::ALL {
            print_axis(&session, axis);
        }
        let uploaded = Axis::ALL
            .iter()
            .flat_map(|a| session.model().tree(*a).keys())
            .filter(|k| is_uploaded(k))
            .count();
        log.info(format!("{uploaded} uploaded categories"));
    }

    if let Some(target) = args.draw {
        let count = args.count.max(1);
        let mut last_error: Option<SelectionError> = None;
        let mut failed = 0usize;
        for _ in 0..count {
            let outcome = match target {
                DrawTarget::Both => {
                    let out = session.draw();
                    let result = match out.errors().next() {
                        Some(err) => Err(err.clone()),
                        None => Ok(()),
                    };
                    result
                }
                DrawTarget::Content => session.redraw(Axis::Content).map(|_| ()),
                DrawTarget::Function => session.redraw(Axis::Function).map(|_| ()),
            };
            if let Err(err) = outcome {
                failed += 1;
                last_error = Some(err);
            }
            let card = session.card();
            println!("{} | {}", card.content, card.function);
        }
        if let Some(err) = last_error {
            if failed == count {
                return Err(err).context("draw cards");
            }
            log.warn(format!("{failed} of {count} draws left a card unchanged"));
        }
    }

    Ok(())
}
