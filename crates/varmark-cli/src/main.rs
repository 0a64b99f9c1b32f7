use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use smol_str::SmolStr;
use tracing_subscriber::EnvFilter;
use varmark_core::{EditorConfig, compile, find_open_brace, normalize, serialize, splice_variable};

#[derive(Parser)]
#[command(version, about = "Varmark - markdown with {variable} tokens", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Editor config file (.toml or .json)
    #[arg(long, global = true, env = "VARMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the markup HTML for a document
    Compile {
        /// Markdown file, or `-` for stdin
        input: PathBuf,
    },
    /// Print the markup tree outline
    Tree {
        /// Markdown file, or `-` for stdin
        input: PathBuf,
    },
    /// Check that a document survives compile and serialize unchanged
    Check {
        /// Markdown file, or `-` for stdin
        input: PathBuf,
    },
    /// Commit a variable token at a char offset
    InsertVar {
        /// Markdown file, or `-` for stdin
        input: PathBuf,

        /// Char offset of the caret
        #[arg(long)]
        at: usize,

        /// Variable name
        #[arg(long = "var")]
        name: SmolStr,
    },
}

fn main() -> Result<()> {
    init_miette();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Commands::Compile { input } => {
            let markdown = read_input(&input)?;
            let html = compile(&markdown).to_html();
            match &config.class_name {
                Some(class) => println!("<div class=\"{class}\">{html}</div>"),
                None => println!("{html}"),
            }
        }
        Commands::Tree { input } => {
            let markdown = read_input(&input)?;
            print!("{}", compile(&markdown).outline());
        }
        Commands::Check { input } => {
            let markdown = read_input(&input)?;
            check(&markdown)?;
            println!("ok");
        }
        Commands::InsertVar { input, at, name } => {
            let markdown = read_input(&input)?;
            print!("{}", insert_var(&markdown, at, &name)?);
        }
    }

    Ok(())
}

fn check(markdown: &str) -> Result<()> {
    let expected = normalize(markdown);
    let actual = serialize(&compile(markdown));
    if actual == expected {
        return Ok(());
    }
    let at = expected
        .chars()
        .zip(actual.chars())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| expected.chars().count().min(actual.chars().count()));
    tracing::debug!(%expected, %actual, "roundtrip mismatch");
    Err(miette::miette!(
        code = "varmark::check::mismatch",
        help = "delimiters must be properly nested and links must use http(s) targets",
        "document does not round-trip; first difference at char {at}"
    ))
}

fn insert_var(markdown: &str, at: usize, name: &str) -> Result<String> {
    if name.is_empty() || name.chars().any(|c| c == '{' || c == '}' || c.is_whitespace()) {
        return Err(miette::miette!(
            code = "varmark::insert_var::name",
            "invalid variable name {name:?}"
        ));
    }
    let len = markdown.chars().count();
    if at > len {
        return Err(miette::miette!(
            code = "varmark::insert_var::offset",
            help = format!("the document is {len} chars long"),
            "offset {at} is past the end of the document"
        ));
    }
    tracing::debug!(
        open_token = find_open_brace(markdown, at).is_some(),
        "inserting variable"
    );
    let (spliced, caret) = splice_variable(markdown, at, name);
    tracing::debug!(caret, "variable inserted");
    Ok(spliced)
}

fn read_input(input: &PathBuf) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).into_diagnostic()?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).into_diagnostic()
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .context_lines(3)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
