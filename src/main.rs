mod config;
mod error;
mod llm_client;
mod prompts;
mod query;
mod rag;
mod session;
mod structure;
mod workspace;

use std::collections::BTreeMap;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::{AppConfig, IndexingConfig};
use rag::indexer::split_documents;
use rag::loader::SourceLoader;
use rag::splitter::{LanguageProfile, TextSplitter};
use session::{ChatSession, ChatTransport, Services, TerminalTransport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "repo-buddy",
    about = "Clone a public GitHub repository, summarize its architecture, and answer questions about its code"
)]
struct Cli {
    /// Repository URL to analyze right away; if omitted the CLI asks for one.
    #[arg(short, long)]
    repo: Option<String>,

    /// One-shot question answered after the analysis; the CLI exits afterwards.
    #[arg(short, long, requires = "repo")]
    question: Option<String>,

    /// Splitter language profile applied to every file in the repository.
    #[arg(long, value_enum)]
    splitter_language: Option<LanguageProfile>,

    /// Number of chunks retrieved as context for each question.
    #[arg(long)]
    top_k: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the directory tree and README the initial analysis would see.
    Tree {
        /// Local directory to describe.
        path: PathBuf,
    },
    /// Split a local directory into chunks without embedding them.
    Chunks {
        /// Local directory to split.
        path: PathBuf,
        /// Emit one JSON object per chunk instead of per-file counts.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

impl Cli {
    fn apply_overrides(&self, indexing: &mut IndexingConfig) {
        if let Some(profile) = self.splitter_language {
            indexing.splitter_language = profile;
        }
        if let Some(top_k) = self.top_k.filter(|k| *k > 0) {
            indexing.top_k = top_k;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        let mut indexing = IndexingConfig::from_env();
        cli.apply_overrides(&mut indexing);
        return match command {
            Commands::Tree { path } => run_tree(path),
            Commands::Chunks { path, json } => run_chunks(path, &indexing, *json),
        };
    }

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("{err}");
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config.indexing);

    let services = Services::from_config(&config).context("Failed to initialize API clients")?;
    let mut session = ChatSession::new(services);
    let transport = TerminalTransport;

    let outcome = run_until_interrupted(
        run_session(&cli, &mut session, &transport),
        tokio::signal::ctrl_c(),
    )
    .await;
    session.end();
    outcome
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Races `work` against a single interrupt listener installed for its whole
/// lifetime. An interrupt drops `work`, which kills an in-flight clone.
async fn run_until_interrupted<W, I>(work: W, interrupt: I) -> anyhow::Result<()>
where
    W: Future<Output = anyhow::Result<()>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::select! {
        outcome = work => outcome,
        signal = interrupt => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
            Ok(())
        }
    }
}

async fn run_session(
    cli: &Cli,
    session: &mut ChatSession,
    transport: &dyn ChatTransport,
) -> anyhow::Result<()> {
    session.start(transport).await?;

    if let Some(repo) = &cli.repo {
        session.handle_message(repo, transport).await?;
    }

    if let Some(question) = &cli.question {
        anyhow::ensure!(
            session.is_ready(),
            "Repository analysis did not complete; question not answered"
        );
        return session.handle_message(question, transport).await;
    }

    run_repl(session, transport).await
}

async fn run_repl(session: &mut ChatSession, transport: &dyn ChatTransport) -> anyhow::Result<()> {
    println!("Type 'exit' to quit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You > ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();

        if trimmed.eq_ignore_ascii_case("exit") {
            info!("User exited CLI");
            break;
        }

        if trimmed.is_empty() {
            continue;
        }

        if let Err(err) = session.handle_message(trimmed, transport).await {
            error!(?err, "Failed to render response");
            return Err(err);
        }
    }

    Ok(())
}

fn run_tree(path: &Path) -> anyhow::Result<()> {
    let tree = structure::describe(path)?;
    println!("{tree}");
    println!("README.md:\n{}", structure::readme_or_sentinel(path));
    Ok(())
}

fn run_chunks(path: &Path, indexing: &IndexingConfig, json: bool) -> anyhow::Result<()> {
    let documents = SourceLoader::with_defaults()?.load(path)?;
    let splitter = TextSplitter::new(
        indexing.splitter_language,
        indexing.chunk_size,
        indexing.chunk_overlap,
    );
    let chunks = split_documents(&splitter, &documents);

    if json {
        let mut stdout = io::stdout().lock();
        for chunk in &chunks {
            serde_json::to_writer(&mut stdout, chunk)?;
            writeln!(stdout)?;
        }
        return Ok(());
    }

    let mut per_file: BTreeMap<&str, usize> = BTreeMap::new();
    for chunk in &chunks {
        *per_file.entry(chunk.source.as_str()).or_default() += 1;
    }
    for (source, count) in &per_file {
        println!("{count:>5}  {source}");
    }
    println!(
        "{} chunks from {} files (profile {:?}, size {}, overlap {})",
        chunks.len(),
        documents.len(),
        indexing.splitter_language,
        indexing.chunk_size,
        indexing.chunk_overlap
    );
    Ok(())
}
