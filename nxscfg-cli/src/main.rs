//! Command-line front end for NeXus component definitions.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use clap::{ArgAction, Parser, Subcommand};
use nxs_config::{
    parse_file, Document, MergeRules, Merger, ModelIndex, TreeModel, XmlPrinter,
    XmlPrinterOptions, COLUMN_COUNT,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// NeXus component definition tool
#[derive(Parser)]
#[command(name = "nxscfg")]
#[command(version)]
#[command(about = "Merge and inspect NeXus component definitions", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine component files and merge duplicate definitions
    #[command(visible_alias = "m")]
    Merge {
        /// Component files; later files are imported into the first
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Indent the written XML
        #[arg(long)]
        pretty: bool,

        /// Skip the allowed-children check
        #[arg(long)]
        no_grammar: bool,
    },

    /// Print the rows of the tree model
    #[command(visible_alias = "s")]
    Show {
        /// Component file
        input: String,

        /// Show attributes instead of the type column
        #[arg(short, long)]
        attributes: bool,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge {
            inputs,
            output,
            pretty,
            no_grammar,
        } => run_merge(&inputs, output.as_deref(), pretty, no_grammar),
        Commands::Show { input, attributes } => run_show(&input, attributes),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

/// Installs a stderr subscriber; `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Loads every input, imports the contents of each later top element under
/// the first one, merges, and writes the result.
fn run_merge(
    inputs: &[String],
    output_path: Option<&str>,
    pretty: bool,
    no_grammar: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (first, rest) = inputs.split_first().ok_or("no input files")?;

    info!(path = %first, "loading");
    let mut document = parse_file(first)?;
    let target = document
        .document_element()
        .ok_or_else(|| format!("{}: no top-level element", first))?;

    for path in rest {
        info!(path = %path, "importing");
        let other = parse_file(path)?;
        let Some(top) = other.document_element() else {
            debug!(path = %path, "empty document skipped");
            continue;
        };
        for child in other.children(top) {
            if other.element(child).is_some() {
                document.import(&other, child, target)?;
            }
        }
    }

    let rules = if no_grammar {
        MergeRules::nexus().without_grammar()
    } else {
        MergeRules::nexus()
    };
    let stats = Merger::new(rules).merge(&mut document)?;
    info!(merged = stats.merged, "merge complete");

    let mut output: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };
    let options = XmlPrinterOptions {
        pretty_print: pretty,
    };
    XmlPrinter::with_options(&mut output, options).print(&document)?;

    Ok(())
}

/// Prints one line per model row, indented by depth, with the three
/// columns separated by tabs.
fn run_show(input: &str, attributes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let document: Document = parse_file(input)?;
    let mut model = TreeModel::new(document);
    model.set_attribute_view(attributes);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let header: Vec<&str> = (0..COLUMN_COUNT)
        .filter_map(|c| model.header_data(c))
        .collect();
    writeln!(out, "{}", header.join("\t"))?;

    let mut pending = vec![(ModelIndex::invalid(), 0usize, 0usize)];
    while let Some((parent, row, depth)) = pending.pop() {
        if row >= model.row_count(parent) {
            continue;
        }
        pending.push((parent, row + 1, depth));

        let cells: Vec<String> = (0..COLUMN_COUNT)
            .map(|column| {
                let index = model.index(row, column, parent);
                model.data(index)
            })
            .collect();
        writeln!(out, "{}{}", "  ".repeat(depth), cells.join("\t"))?;

        let index = model.index(row, 0, parent);
        if model.has_children(index) {
            pending.push((index, 0, depth + 1));
        }
    }

    Ok(())
}
