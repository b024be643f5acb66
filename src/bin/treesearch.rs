//! Command-line runner for tree scripts.
//!
//! Usage:
//!   treesearch <input_file> [--output output_file.txt] [--dump text|json] [-v|-q]
//!
//! The input's first line is the tree order; every following line is
//! `Insert(key,value)`, `Search(key)` or `Search(key1,key2)`. Search results
//! are written to the output file, one line per search.

use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::exit;
use treesearch::{run_script, BPlusTree, Result};

#[derive(Parser)]
#[command(name = "treesearch", about = "Run a B+ tree command script", version)]
struct Cli {
    /// Script to execute
    input: PathBuf,

    /// File that receives one line per search
    #[arg(long, short = 'o', default_value = "output_file.txt")]
    output: PathBuf,

    /// Print the final tree to stdout
    #[arg(long, value_enum)]
    dump: Option<DumpFormat>,

    /// Enable info-level logs on stderr
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Disable all logs
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpFormat {
    /// Levels followed by the leaf chain
    Text,
    /// Nested JSON export
    Json,
}

fn init_tracing(cli: &Cli) {
    // --quiet wins; --verbose honours RUST_LOG and falls back to info;
    // otherwise only warnings unless RUST_LOG says more.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<BPlusTree> {
    let input = BufReader::new(File::open(&cli.input)?);
    let output = BufWriter::new(File::create(&cli.output)?);
    let (tree, summary) = run_script(input, output)?;
    tracing::info!(
        input = %cli.input.display(),
        output = %cli.output.display(),
        searches = summary.searches + summary.range_searches,
        "results written"
    );
    Ok(tree)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let tree = match run(&cli) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            exit(1);
        }
    };

    match cli.dump {
        Some(DumpFormat::Text) => print!("{}", tree.render()),
        Some(DumpFormat::Json) => match serde_json::to_string_pretty(&tree.export()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                exit(1);
            }
        },
        None => {}
    }
}
