//! `folio`: ask questions about documents larger than a model's context window.
//!
//! ```bash
//! folio index ./reports/annual-2024.txt --name "Annual 2024"
//! folio ask annual-2024 "How did pricing change?"
//! folio ask annual-2024 "And in Europe?" --conversation <id>
//! folio ask-file ./notes.md "What are the action items?"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use folio_core::bootstrap::create_provider;
use folio_core::config::{Config, resolve_config_path};
use folio_core::{Answer, Engine};
use folio_index::IndexOptions;
use folio_llm::any::AnyProvider;

/// Question answering over large documents.
///
/// Documents are split into overlapping segments, summarized into an index, and
/// answered by folding the most relevant segments into a single answer.
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `$FOLIO_CONFIG`, then `config/default.toml`. Missing files fall back
    /// to built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index from a text or PDF document.
    Index {
        path: PathBuf,

        /// Display name; its slug becomes the index ID.
        #[arg(long)]
        name: Option<String>,

        /// Do not store segment text; re-read it from the source file when needed.
        #[arg(long)]
        no_content: bool,
    },

    /// Ask a question against an existing index.
    Ask {
        index: String,
        question: String,

        /// Continue an existing conversation instead of starting a new one.
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Ask a question about a file, indexing it first if it is large.
    AskFile { path: PathBuf, question: String },

    /// List indexes.
    Indexes,

    /// Show an index's summary, keywords, and segments.
    Info { index: String },

    /// Delete an index.
    DeleteIndex { index: String },

    /// List conversations, optionally for one index.
    Conversations {
        #[arg(long)]
        index: Option<String>,
    },

    /// Show a conversation's history.
    Conversation { id: String },

    /// Delete a conversation.
    DeleteConversation { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let provider = create_provider(&config)?;
    let engine = Engine::new(config, provider);

    run(&engine, cli.command).await
}

/// Logs go to stderr so answers on stdout stay clean.
fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(engine: &Engine<AnyProvider>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Index {
            path,
            name,
            no_content,
        } => index(engine, &path, name, no_content).await,
        Command::Ask {
            index,
            question,
            conversation,
        } => {
            let answer = engine
                .answer_question(&index, &question, conversation.as_deref())
                .await
                .with_context(|| format!("failed to answer question against index {index}"))?;
            print_answer(&answer);
            Ok(())
        }
        Command::AskFile { path, question } => {
            let answer = engine
                .ask_document(&path, &question)
                .await
                .with_context(|| format!("failed to answer question about {}", path.display()))?;
            print_answer(&answer);
            Ok(())
        }
        Command::Indexes => {
            let indexes = engine.list_indexes().await?;
            if indexes.is_empty() {
                println!("No indexes.");
            }
            for idx in indexes {
                println!(
                    "{}\t{}\t{} segments\tupdated {}",
                    idx.id,
                    idx.name,
                    idx.segment_count,
                    idx.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Command::Info { index } => {
            let Some(info) = engine.get_index_info(&index).await? else {
                bail!("index not found: {index}");
            };
            println!("ID:        {}", info.id);
            println!("Name:      {}", info.name);
            println!("Segments:  {}", info.segment_count);
            println!("Created:   {}", info.created_at.to_rfc3339());
            println!("Updated:   {}", info.updated_at.to_rfc3339());
            if let Some(source) = &info.options.source {
                println!("Source:    {source}");
            }
            let content = if info.options.persist_content {
                "stored"
            } else {
                "read from source"
            };
            println!("Content:   {content}");
            println!("Keywords:  {}", info.keywords.join(", "));
            println!("\nSummary:\n{}\n", info.summary);
            for segment in &info.segments {
                println!(
                    "  {}: {}",
                    segment.id,
                    segment.summary.as_deref().unwrap_or("(no summary)")
                );
            }
            Ok(())
        }
        Command::DeleteIndex { index } => {
            if engine.delete_index(&index).await? {
                println!("Deleted index {index}.");
            } else {
                println!("No index named {index}.");
            }
            Ok(())
        }
        Command::Conversations { index } => {
            let conversations = engine.list_conversations(index.as_deref()).await?;
            if conversations.is_empty() {
                println!("No conversations.");
            }
            for c in conversations {
                println!(
                    "{}\t{}\t{} exchanges\tupdated {}",
                    c.id,
                    c.index_id,
                    c.exchange_count,
                    c.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        Command::Conversation { id } => {
            let Some(conversation) = engine.get_conversation_info(&id).await? else {
                bail!("conversation not found: {id}");
            };
            println!("ID:        {}", conversation.id);
            println!("Index:     {}", conversation.index_id);
            println!("Exchanges: {}", conversation.exchange_count);
            let history = conversation.history_text();
            if !history.is_empty() {
                println!("\n{history}");
            }
            Ok(())
        }
        Command::DeleteConversation { id } => {
            if engine.delete_conversation(&id).await? {
                println!("Deleted conversation {id}.");
            } else {
                println!("No conversation {id}.");
            }
            Ok(())
        }
    }
}

async fn index(
    engine: &Engine<AnyProvider>,
    path: &Path,
    name: Option<String>,
    no_content: bool,
) -> anyhow::Result<()> {
    let options = IndexOptions {
        name,
        persist_content: engine.config().storage.persist_content && !no_content,
        ..IndexOptions::default()
    };
    let report = engine
        .create_index(path, options)
        .await
        .with_context(|| format!("failed to index {}", path.display()))?;

    println!(
        "Indexed {} as {} ({} segments).",
        path.display(),
        report.index_id,
        report.segments
    );
    if report.enrichment_failures > 0 {
        eprintln!(
            "warning: {} segment(s) could not be summarized; keyword search will not find them",
            report.enrichment_failures
        );
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim());
    if !answer.sources.is_empty() {
        eprintln!("\nsources: {}", answer.sources.join(", "));
    }
    if let Some(id) = &answer.conversation_id {
        eprintln!("conversation: {id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_index_flags() {
        let cli = Cli::parse_from(["folio", "index", "doc.txt", "--name", "Doc", "--no-content"]);
        match cli.command {
            Command::Index {
                path,
                name,
                no_content,
            } => {
                assert_eq!(path, PathBuf::from("doc.txt"));
                assert_eq!(name.as_deref(), Some("Doc"));
                assert!(no_content);
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn cli_parses_global_config_after_subcommand() {
        let cli = Cli::parse_from([
            "folio",
            "ask",
            "doc",
            "What changed?",
            "--conversation",
            "abc",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Command::Ask {
                index,
                question,
                conversation,
            } => {
                assert_eq!(index, "doc");
                assert_eq!(question, "What changed?");
                assert_eq!(conversation.as_deref(), Some("abc"));
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn cli_uses_kebab_case_subcommands() {
        assert!(Cli::try_parse_from(["folio", "ask-file", "a.txt", "q"]).is_ok());
        assert!(Cli::try_parse_from(["folio", "delete-index", "a"]).is_ok());
        assert!(Cli::try_parse_from(["folio", "delete-conversation", "a"]).is_ok());
        assert!(Cli::try_parse_from(["folio", "conversations", "--index", "a"]).is_ok());
        assert!(Cli::try_parse_from(["folio", "unknown"]).is_err());
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
