//! helpview CLI tool
//!
//! Drives a live help server from the command line with the same session the
//! browser viewer uses.
//!
//! ## Commands
//!
//! - `toc [--href <topic>] [--json]`: print the table of contents, optionally
//!   opened and selected at a topic
//! - `search <words> [--full] [--scope <scope>] [--href <topic>]`: print
//!   type-ahead proposals, or grouped full-search results

use clap::{Parser, Subcommand};
use helpview_core::{
    channel::HttpFetcher,
    config::{ConfigProvider, MemoryClientState, TomlConfigProvider, ViewerConfig},
    delay::TokioDelay,
    scope::Scope,
    search::{FullSearchView, ResultEntry, ResultView, SearchOutcome},
    viewer::HelpViewer,
    HelpError,
};
use std::path::PathBuf;

type Viewer = HelpViewer<HttpFetcher, TokioDelay>;

#[derive(Parser)]
#[command(name = "helpview")]
#[command(author, version, about = "Browse and search a help server from the terminal", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Help server root, overriding the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the table of contents
    Toc {
        /// Topic to open and select, relative to the server root
        #[arg(long)]
        href: Option<String>,

        /// Print the visible rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the help server
    Search {
        /// Words to search for
        #[arg(required = true)]
        words: Vec<String>,

        /// Run a full search instead of a type-ahead query
        #[arg(short, long)]
        full: bool,

        /// none, book, chapter or custom:<name>
        #[arg(short, long, default_value = "none")]
        scope: String,

        /// Topic whose book or chapter a book/chapter scope applies to
        #[arg(long)]
        href: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<ViewerConfig, HelpError> {
    let mut config = match &cli.config {
        Some(path) => TomlConfigProvider::new(path.clone()).get_config()?,
        None => ViewerConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Select the TOC node for `href` (relative to the server root).
async fn open_topic(viewer: &Viewer, href: &str) -> Result<(), HelpError> {
    let url = viewer.config().resolve(href)?;
    if viewer.sync_toc(url.as_str()).await.is_none() {
        eprintln!("Topic not found in the table of contents: {href}");
    }
    Ok(())
}

async fn parse_scope(viewer: &Viewer, scope: &str) -> Result<Scope, HelpError> {
    match scope {
        "none" => Ok(Scope::None),
        "book" => Ok(Scope::Book),
        "chapter" => Ok(Scope::Chapter),
        other => {
            let Some(name) = other.strip_prefix("custom:") else {
                return Err(HelpError::Config(format!("Unknown scope '{other}'")));
            };
            let custom = viewer.scope().custom_scopes().await;
            let index = custom
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| HelpError::NotFound(format!("custom scope '{name}'")))?;
            Ok(Scope::Custom {
                name: name.to_string(),
                index,
            })
        }
    }
}

fn row_text(row: &ResultView) -> String {
    row.title.iter().map(|s| s.text()).collect()
}

fn print_entries(view: &FullSearchView, entries: &[ResultEntry], depth: usize) {
    for entry in entries {
        let indent = "  ".repeat(depth);
        match entry {
            ResultEntry::Result(i) => {
                if let Some(row) = view.results.get(*i) {
                    println!("{indent}- {} <{}>", row_text(row), row.url);
                }
            }
            ResultEntry::Group(group) => {
                println!("{indent}{} ({})", group.label(), group.count);
                print_entries(view, &group.children, depth + 1);
            }
        }
    }
}

fn print_outcome(outcome: &SearchOutcome) {
    match outcome {
        SearchOutcome::TypeAhead(view) => {
            println!("{}", view.label);
            if let Some(completion) = &view.hints.completion {
                println!("  completion: {completion}");
            }
            for proposal in &view.hints.proposals {
                println!("  hint: {}", proposal.text);
            }
            for row in &view.results {
                match &row.book {
                    Some(book) => println!("  {} ({book})", row_text(row)),
                    None => println!("  {}", row_text(row)),
                }
            }
        }
        SearchOutcome::Full(view) => {
            println!("{}", view.label);
            match view.message() {
                Some(message) => println!("{message}"),
                None => print_entries(view, &view.groups, 1),
            }
        }
        SearchOutcome::Indexing(progress) => println!("Indexing... {progress}%"),
        SearchOutcome::Hidden => println!("No proposals"),
        other => tracing::debug!("Search ended with {:?}", other),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let viewer = HelpViewer::new(
        HttpFetcher::new(),
        TokioDelay,
        config,
        MemoryClientState::default(),
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        viewer.init().await;
        match &cli.command {
            Commands::Toc { href, json } => {
                if let Some(href) = href {
                    open_topic(&viewer, href).await?;
                }
                match json {
                    true => println!(
                        "{}",
                        serde_json::to_string_pretty(&viewer.toc().render_rows())?
                    ),
                    false => print!("{}", viewer.toc().render_text()),
                }
            }
            Commands::Search {
                words,
                full,
                scope,
                href,
            } => {
                if let Some(href) = href {
                    open_topic(&viewer, href).await?;
                }
                let scope = parse_scope(&viewer, scope).await?;
                viewer.set_scope(scope).await;
                let text = words.join(" ");
                let outcome = match full {
                    true => viewer.full_search(&text).await,
                    false => viewer.type_ahead(&text).await,
                };
                print_outcome(&outcome);
            }
        }
        Ok::<(), HelpError>(())
    })?;
    Ok(())
}
