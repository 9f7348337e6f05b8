//! glint - print the style ranges of a document's fenced code blocks
//!
//! Each range is printed as `start<TAB>end<TAB>tag`, offsets in bytes.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use glint::error::{HighlightError, Result};
use glint::{Config, Engine, GrammarRegistry};

fn main() {
    glint::logging::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut languages = Vec::new();
    let mut file = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-V" => {
                print_version();
                return Ok(());
            }
            "--lang" | "-l" => match args.next() {
                Some(lang) => languages.push(lang),
                None => return Err(HighlightError::Message("--lang needs a value".into())),
            },
            _ if arg.starts_with('-') => {
                return Err(HighlightError::Message(format!("unknown option {}", arg)));
            }
            _ => file = Some(PathBuf::from(arg)),
        }
    }

    let Some(path) = file else {
        print_usage();
        process::exit(2);
    };

    let config = Config::load();
    let mut registry = GrammarRegistry::with_builtins();
    if let Some(dir) = &config.grammar_dir {
        let loaded = registry.load_dir(dir)?;
        tracing::info!("loaded {} grammars from {}", loaded.len(), dir.display());
    }

    if languages.is_empty() {
        languages = registry.names().into_iter().map(str::to_string).collect();
    }

    let document = fs::read_to_string(&path)?;
    let engine = Engine::new(&config);
    for range in engine.highlight_document(&registry, &languages, &document) {
        println!("{}\t{}\t{}", range.start, range.end, range.tag);
    }

    Ok(())
}

fn print_usage() {
    println!("glint {} - highlight fenced code blocks", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: glint [OPTIONS] FILE");
    println!();
    println!("Prints one line per style range: start, end and tag, tab separated.");
    println!();
    println!("Options:");
    println!("  -l, --lang ID  Highlight blocks of this language (repeatable;");
    println!("                 default: every registered grammar)");
    println!("  -h, --help     Show this help message");
    println!("  -V, --version  Show version information");
    println!();
    println!("Settings are read from ~/.glint.toml");
}

fn print_version() {
    println!("glint {}", env!("CARGO_PKG_VERSION"));
}
