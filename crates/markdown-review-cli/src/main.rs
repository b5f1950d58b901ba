mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markdown_review_config::Config;
use markdown_review_engine::critic::{
    StripOptions, strip_annotations_with, to_portable_annotations_with, to_presentation_markup_with,
};
use markdown_review_engine::diff::generate_changes_with;
use markdown_review_engine::normalize::normalize_with;
use markdown_review_engine::{
    ChangeTracker, Element, NormalizeOptions, Operation, ReviewContext, validate_annotations,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use store::FileStore;

/// Review tooling for markdown documents with tracked changes
#[derive(Parser, Debug)]
#[command(name = "markdown-review")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.config/markdown-review/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized form of a document
    Normalize { file: PathBuf },

    /// Show the changes between two versions of a document
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Render <ins>/<del> markup instead of portable annotations
        #[arg(long, conflicts_with = "json")]
        presentation: bool,

        /// Print the raw change list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve all annotations in a document
    Resolve {
        file: PathBuf,

        /// Reject the changes instead of accepting them
        #[arg(long)]
        reject: bool,

        /// Keep comments as HTML comments
        #[arg(long)]
        keep_comments: bool,
    },

    /// Check a document for unterminated annotations
    Check { file: PathBuf },

    /// Apply a saved review session to the pristine source
    Patch {
        pristine: PathBuf,
        session: PathBuf,
    },

    /// Manage saved drafts
    Draft {
        #[command(subcommand)]
        command: DraftCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DraftCommand {
    /// Save the operations of a session file as a draft
    Save { name: String, session: PathBuf },
    /// Print a saved draft as a JSON operation list
    Show { name: String },
    /// Delete a saved draft
    Clear { name: String },
}

/// A review session as exported by the editor.
#[derive(Debug, Deserialize)]
struct Session {
    elements: Vec<Element>,
    #[serde(default)]
    operations: Vec<Operation>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?.unwrap_or_default(),
        None => Config::load_or_default()?,
    };
    log::debug!("using config {config:?}");

    let output = run(cli.command, &config)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn run(command: Command, config: &Config) -> Result<String> {
    let options = normalize_options(config);
    match command {
        Command::Normalize { file } => Ok(normalize_with(&read(&file)?, &options)),
        Command::Diff {
            old,
            new,
            presentation,
            json,
        } => {
            let old = read(&old)?;
            let new = read(&new)?;
            let changes = generate_changes_with(&old, &new, &options);
            if json {
                return Ok(serde_json::to_string_pretty(&changes)?);
            }
            if presentation {
                let attribution = config.author().map(|author| {
                    ReviewContext::new(FileStore::new(config.draft_dir())).attribution_for(&author)
                });
                return Ok(to_presentation_markup_with(
                    &old,
                    &changes,
                    attribution.as_ref(),
                    &options,
                ));
            }
            Ok(to_portable_annotations_with(&old, &changes, &options))
        }
        Command::Resolve {
            file,
            reject,
            keep_comments,
        } => Ok(strip_annotations_with(
            &read(&file)?,
            !reject,
            StripOptions {
                preserve_comments_as_html: keep_comments,
            },
        )),
        Command::Check { file } => {
            validate_annotations(&read(&file)?)
                .with_context(|| format!("{} has malformed annotations", file.display()))?;
            Ok(String::new())
        }
        Command::Patch { pristine, session } => {
            let pristine = read(&pristine)?;
            let tracker = load_session(&session, options)?;
            Ok(match tracker.patch_source(&pristine) {
                Some(patched) => patched,
                None => {
                    log::warn!("could not patch the source, writing the reconstructed document");
                    tracker.to_clean_markdown()
                }
            })
        }
        Command::Draft { command } => run_draft(command, config),
    }
}

fn run_draft(command: DraftCommand, config: &Config) -> Result<String> {
    let mut context = ReviewContext::new(FileStore::new(config.draft_dir()));
    match command {
        DraftCommand::Save { name, session } => {
            let tracker = load_session(&session, normalize_options(config))?;
            context.save_draft(&name, tracker.operations())?;
            Ok(format!(
                "Saved draft {name}: {}",
                tracker.summarize_operations()
            ))
        }
        DraftCommand::Show { name } => match context.load_draft(&name)? {
            Some(operations) => Ok(serde_json::to_string_pretty(&operations)?),
            None => anyhow::bail!("No draft named {name}"),
        },
        DraftCommand::Clear { name } => {
            context.clear_draft(&name);
            Ok(String::new())
        }
    }
}

fn normalize_options(config: &Config) -> NormalizeOptions {
    NormalizeOptions {
        list_threshold: config.normalize.list_threshold,
        bullet_indent: config.normalize.bullet_indent,
        ordered_indent: config.normalize.ordered_indent,
    }
}

fn load_session(path: &Path, options: NormalizeOptions) -> Result<ChangeTracker> {
    let session: Session = serde_json::from_str(&read(path)?)
        .with_context(|| format!("Failed to parse session file {}", path.display()))?;
    let mut tracker = ChangeTracker::with_options(session.elements, options);
    tracker.restore(session.operations);
    Ok(tracker)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
