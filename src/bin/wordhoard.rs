// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use wordhoard::{
    config::Settings,
    export::{export, import},
    lookup::Lookup,
    path::{default_config_path, default_store_dir},
    record::{Difficulty, IdentityKey, Source, WordDraft, WordEdit, WordRecord},
    remote::AnyTransport,
    store::{Order, Query, Status, Store, StoreError},
    sync::{PushStatus, SyncOutcome, SyncReport, Syncer},
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Text};
use std::{collections::HashSet, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "wordhoard [options] <wordhoard-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let context = Context::load(self.global)?;
        match self.command {
            Command::Add(opts) => run_add(context, opts).await,
            Command::Edit(opts) => run_edit(context, opts).await,
            Command::Master(opts) => run_master(context, opts).await,
            Command::Remove(opts) => run_remove(context, opts).await,
            Command::List(opts) => run_list(context, opts),
            Command::Show(opts) => run_show(context, opts),
            Command::Stats => run_stats(context),
            Command::Export(opts) => run_export(context, opts),
            Command::Import(opts) => run_import(context, opts),
            Command::Sync(opts) => run_sync(context, opts).await,
            Command::Watch => run_watch(context).await,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to word store directory.
    #[arg(long, global = true, value_name = "path")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Add new words, looking up their details online.
    #[command(override_usage = "wordhoard add [options] <word>...")]
    Add(AddOptions),

    /// Edit details of stored word.
    #[command(override_usage = "wordhoard edit [options] <word>")]
    Edit(EditOptions),

    /// Flip mastered status of stored word.
    #[command(override_usage = "wordhoard master <word>")]
    Master(WordOptions),

    /// Remove words from word store.
    #[command(override_usage = "wordhoard remove [options] <word>...")]
    Remove(RemoveOptions),

    /// List stored words.
    #[command(override_usage = "wordhoard list [options]")]
    List(ListOptions),

    /// Show everything known about stored word.
    #[command(override_usage = "wordhoard show <word>")]
    Show(WordOptions),

    /// Show word counts.
    Stats,

    /// Write snapshot of word store to export directory.
    #[command(override_usage = "wordhoard export [options]")]
    Export(ExportOptions),

    /// Merge exported files into word store.
    #[command(override_usage = "wordhoard import <pattern>...")]
    Import(ImportOptions),

    /// Synchronize word store with remote snapshot.
    #[command(override_usage = "wordhoard sync [options]")]
    Sync(SyncOptions),

    /// Keep synchronizing until interrupted.
    Watch,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Words to add.
    #[arg(required = true, value_name = "word")]
    pub words: Vec<String>,

    /// Skip lookup and use this definition.
    #[arg(short, long, value_name = "text")]
    pub definition: Option<String>,

    /// Difficulty level of new words.
    #[arg(short = 'D', long, value_name = "level")]
    pub difficulty: Option<Difficulty>,

    /// Personal notes for new words.
    #[arg(short, long, value_name = "text")]
    pub notes: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct EditOptions {
    /// Word to edit.
    #[arg(required = true, value_name = "word")]
    pub word: String,

    /// New definition.
    #[arg(short, long, value_name = "text")]
    pub definition: Option<String>,

    /// New part of speech.
    #[arg(short, long, value_name = "text")]
    pub part_of_speech: Option<String>,

    /// New pronunciation.
    #[arg(long, value_name = "text")]
    pub pronunciation: Option<String>,

    /// Replace examples, repeat for several.
    #[arg(short, long = "example", value_name = "sentence")]
    pub examples: Option<Vec<String>>,

    /// Replace synonyms, comma separated.
    #[arg(short, long, value_delimiter = ',', value_name = "words")]
    pub synonyms: Option<Vec<String>>,

    /// Replace antonyms, comma separated.
    #[arg(short, long, value_delimiter = ',', value_name = "words")]
    pub antonyms: Option<Vec<String>>,

    /// New difficulty level.
    #[arg(short = 'D', long, value_name = "level")]
    pub difficulty: Option<Difficulty>,

    /// New personal notes.
    #[arg(short, long, value_name = "text")]
    pub notes: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct WordOptions {
    /// Stored word.
    #[arg(required = true, value_name = "word")]
    pub word: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveOptions {
    /// Words to remove.
    #[arg(required = true, value_name = "word")]
    pub words: Vec<String>,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Only words mentioning this text.
    #[arg(short, long, value_name = "text")]
    pub search: Option<String>,

    /// Only words of this difficulty level.
    #[arg(short = 'D', long, value_name = "level")]
    pub difficulty: Option<Difficulty>,

    /// Only mastered words.
    #[arg(short, long, group = "status")]
    pub mastered: bool,

    /// Only words still being learned.
    #[arg(short, long, group = "status")]
    pub learning: bool,

    /// Listing order.
    #[arg(short, long, value_enum, default_value_t = Order::Newest)]
    pub order: Order,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportOptions {
    /// Directory to write export into instead of the configured one.
    #[arg(short, long, value_name = "path")]
    pub dir: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ImportOptions {
    /// Files or glob patterns to import.
    #[arg(required = true, value_name = "pattern")]
    pub patterns: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Only merge remote snapshot into word store.
    #[arg(long, group = "direction")]
    pub pull_only: bool,

    /// Only write word store to remote snapshot.
    #[arg(long, group = "direction")]
    pub push_only: bool,
}

const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings and word store location for a single run.
struct Context {
    settings: Settings,
    store_dir: PathBuf,
}

impl Context {
    fn load(opts: GlobalOptions) -> Result<Self> {
        let config_path = match opts.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let settings = Settings::load(config_path)?;
        let store_dir = match opts.store.or_else(|| settings.store_dir.clone()) {
            Some(path) => path,
            None => default_store_dir()?,
        };

        Ok(Self {
            settings,
            store_dir,
        })
    }

    fn open_store(&self) -> Result<Store> {
        Ok(Store::open(&self.store_dir)?)
    }

    fn syncer(&self, store: Store) -> Result<Option<Syncer<AnyTransport>>> {
        let Some(remote) = &self.settings.remote else {
            return Ok(None);
        };
        let transport = AnyTransport::from_settings(remote, store.path(), REMOTE_TIMEOUT)?;
        info!("sync through {transport}");

        Ok(Some(Syncer::new(store, transport)))
    }

    /// Push word store after a change, if configured to.
    async fn sync_after_change(&self, store: Store) -> Result<()> {
        if !self.settings.sync.push_on_change {
            return Ok(());
        }
        let Some(syncer) = self.syncer(store)? else {
            return Ok(());
        };

        let bar = spinner("synchronizing with remote snapshot")?;
        let outcome = syncer.sync().await?;
        bar.finish_and_clear();
        report_outcome(&outcome);

        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_add(context: Context, opts: AddOptions) -> Result<()> {
    let mut store = context.open_store()?;
    let words = words_to_add(&store, &opts.words);

    let mut drafts = Vec::new();
    if let Some(definition) = &opts.definition {
        for word in &words {
            let draft = WordDraft {
                definition: definition.clone(),
                ..WordDraft::new(word.as_str())
            };
            drafts.push((draft, Source::Manual));
        }
    } else if !words.is_empty() {
        let lookup = Lookup::from_settings(&context.settings.lookup)?;
        let bar = spinner(format!("looking up {}", words.join(", ")))?;
        let results = lookup.lookup_all(&words).await;
        bar.finish_and_clear();

        for (word, result) in results {
            match result {
                Ok(found) => drafts.push((found.draft, found.source)),
                Err(error) => {
                    warn!("lookup of {word:?} failed: {error}");
                    if let Some(draft) = prompt_manual_draft(word)? {
                        drafts.push((draft, Source::Manual));
                    }
                }
            }
        }
    }

    if drafts.is_empty() {
        bail!("no word was added");
    }

    let mut added = 0;
    for (mut draft, source) in drafts {
        if opts.difficulty.is_some() {
            draft.difficulty = opts.difficulty;
        }
        if let Some(notes) = &opts.notes {
            draft.notes = notes.clone();
        }
        // Lookups may return a different spelling than asked for.
        match store.add(draft, source) {
            Ok(record) => {
                print_record(record);
                added += 1;
            }
            Err(StoreError::Duplicate(word)) => warn!("{word:?} is already stored, skip it"),
            Err(error) => return Err(error.into()),
        }
    }

    if added == 0 {
        bail!("no word was added");
    }

    context.sync_after_change(store).await
}

/// Trimmed words not yet stored, each identity key at most once.
fn words_to_add(store: &Store, words: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .iter()
        .map(|word| word.trim().to_string())
        .filter(|word| !word.is_empty())
        .filter(|word| seen.insert(IdentityKey::new(word)))
        .filter(|word| {
            let stored = store.find(word).is_some();
            if stored {
                warn!("{word:?} is already stored, skip it");
            }
            !stored
        })
        .collect()
}

fn prompt_manual_draft(word: &str) -> Result<Option<WordDraft>> {
    let manual = Confirm::new(&format!("Enter {word:?} by hand?"))
        .with_default(true)
        .prompt()?;
    if !manual {
        return Ok(None);
    }

    let definition = Text::new("definition").prompt()?;
    let part_of_speech = Text::new("part of speech").with_default("").prompt()?;
    let example = Text::new("example").with_default("").prompt()?;

    Ok(Some(WordDraft {
        definition,
        part_of_speech,
        examples: Some(example).filter(|example| !example.trim().is_empty()).into_iter().collect(),
        ..WordDraft::new(word)
    }))
}

async fn run_edit(context: Context, opts: EditOptions) -> Result<()> {
    let edit = WordEdit {
        definition: opts.definition,
        part_of_speech: opts.part_of_speech,
        pronunciation: opts.pronunciation,
        examples: opts.examples,
        synonyms: opts.synonyms,
        antonyms: opts.antonyms,
        difficulty: opts.difficulty,
        notes: opts.notes,
    };
    if edit.is_empty() {
        bail!("nothing to edit, pass at least one field to change");
    }

    let mut store = context.open_store()?;
    print_record(store.update(&opts.word, edit)?);

    context.sync_after_change(store).await
}

async fn run_master(context: Context, opts: WordOptions) -> Result<()> {
    let mut store = context.open_store()?;
    let record = store.toggle_mastered(&opts.word)?;
    let status = if record.mastered { "mastered" } else { "learning" };
    println!("{}: {status}", record.word);

    context.sync_after_change(store).await
}

async fn run_remove(context: Context, opts: RemoveOptions) -> Result<()> {
    let mut store = context.open_store()?;
    let mut removed = 0;
    for word in opts.words {
        if store.find(&word).is_none() {
            warn!("{word:?} is not stored, skip it");
            continue;
        }

        let confirmed = opts.yes
            || Confirm::new(&format!("Remove {word:?} from word store?"))
                .with_default(false)
                .with_help_message("a remote snapshot that still holds it brings it back")
                .prompt()?;
        if confirmed {
            store.remove(&word)?;
            removed += 1;
        }
    }

    if removed > 0 {
        context.sync_after_change(store).await?;
    }

    Ok(())
}

fn run_list(context: Context, opts: ListOptions) -> Result<()> {
    let store = context.open_store()?;
    let query = Query {
        search: opts.search,
        difficulty: opts.difficulty,
        status: if opts.mastered {
            Status::Mastered
        } else if opts.learning {
            Status::Learning
        } else {
            Status::All
        },
        order: opts.order,
    };

    let hits = store.query(&query);
    if hits.is_empty() {
        info!("no words match");
    }
    for record in hits {
        let mark = if record.mastered { "*" } else { " " };
        println!(
            "{mark} {:<20} {:<12} {:<6} {}",
            record.word, record.part_of_speech, record.difficulty, record.definition
        );
    }

    Ok(())
}

fn run_show(context: Context, opts: WordOptions) -> Result<()> {
    let store = context.open_store()?;
    match store.find(&opts.word) {
        Some(record) => print_record(record),
        None => bail!("{:?} is not stored", opts.word),
    }

    Ok(())
}

fn run_stats(context: Context) -> Result<()> {
    let stats = context.open_store()?.stats();
    println!("total:    {}", stats.total);
    println!("mastered: {}", stats.mastered);
    println!("learning: {}", stats.learning);
    println!("easy:     {}", stats.easy);
    println!("medium:   {}", stats.medium);
    println!("hard:     {}", stats.hard);

    Ok(())
}

fn run_export(context: Context, opts: ExportOptions) -> Result<()> {
    let store = context.open_store()?;
    let dir = opts.dir.unwrap_or(context.settings.export_dir);
    let path = export(&store, dir)?;
    println!("{}", path.display());

    Ok(())
}

fn run_import(context: Context, opts: ImportOptions) -> Result<()> {
    let mut store = context.open_store()?;
    let report = import(&mut store, &opts.patterns)?;
    println!(
        "{} added, {} updated, {} unchanged, {} skipped",
        report.added, report.updated, report.unchanged, report.skipped
    );

    Ok(())
}

async fn run_sync(context: Context, opts: SyncOptions) -> Result<()> {
    let store = context.open_store()?;
    let Some(syncer) = context.syncer(store)? else {
        bail!("no [remote] table in configuration, nothing to sync with");
    };

    let bar = spinner(format!("synchronizing through {}", syncer.transport()))?;
    let outcome = if opts.pull_only {
        syncer.pull().await?
    } else if opts.push_only {
        syncer.push().await?
    } else {
        syncer.sync().await?
    };
    bar.finish_and_clear();
    report_outcome(&outcome);

    Ok(())
}

async fn run_watch(context: Context) -> Result<()> {
    let store = context.open_store()?;
    let Some(syncer) = context.syncer(store)? else {
        bail!("no [remote] table in configuration, nothing to watch");
    };

    info!("watching, press Ctrl-C to stop");
    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };
    syncer.watch(&context.settings.sync, shutdown).await?;

    Ok(())
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {elapsed:.dim} {msg}")?);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

fn report_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Done(SyncReport {
            push: PushStatus::ManualActionRequired { url },
            ..
        }) => {
            info!("{outcome}");
            println!("Open this URL and submit the issue to publish your words:\n{url}");
        }
        SyncOutcome::Done(SyncReport {
            push: PushStatus::Failed(_),
            ..
        }) => warn!("{outcome}"),
        _ => info!("{outcome}"),
    }
}

fn print_record(record: &WordRecord) {
    println!("{} ({})", record.word, record.difficulty);
    if !record.pronunciation.is_empty() {
        println!("  pronunciation: {}", record.pronunciation);
    }
    if !record.part_of_speech.is_empty() {
        println!("  part of speech: {}", record.part_of_speech);
    }
    println!("  definition: {}", record.definition);
    for example in &record.examples {
        println!("  example: {example}");
    }
    if !record.synonyms.is_empty() {
        println!("  synonyms: {}", record.synonyms.join(", "));
    }
    if !record.antonyms.is_empty() {
        println!("  antonyms: {}", record.antonyms.join(", "));
    }
    if !record.notes.is_empty() {
        println!("  notes: {}", record.notes);
    }
    println!(
        "  mastered: {}, source: {}, added: {}",
        record.mastered,
        record.source,
        record.created_at.format("%Y-%m-%d")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test]
    fn words_to_add_drops_repeats_and_stored_words() -> Result<()> {
        let mut store = Store::open(".")?;
        store.add(WordDraft::new("cat"), Source::Manual)?;

        let words = ["Lucid", " lucid ", "CAT", "", "ossify", "Ossify"].map(String::from);
        assert_eq!(words_to_add(&store, &words), vec!["Lucid", "ossify"]);

        Ok(())
    }
}
