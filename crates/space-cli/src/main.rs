//! space: encrypted file storage on an append-only record chain
//!
//! Commands:
//!   init <alias>              - create a keystore and register the alias
//!   add <file>                - store a file (chunked or as deltas)
//!   list [<type>...]          - list own and shared files, optionally by type
//!   show <hash>               - print a file's metadata and tags
//!   get <hash> [<output>]     - write a file's current content
//!   amend <hash>              - append one delta (--offset/--delete/--insert)
//!   set <hash> [<file>]       - replace a file's content (stdin when omitted)
//!   share <hash> <alias>...   - grant other aliases read access
//!   tag <hash> [<tag>...]     - tag a file, or list its tags
//!   search <term>...          - search by name, `type:`, and `tag:` terms
//!   config show               - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use space_chain::{
    AliasRegistry, Block, BlockEntry, FileCache, LoggingMiningListener, MiningListener, Node,
};
use space_client::{MetaFilter, SearchQuery, SpaceClient, TypeFilter};
use space_core::config::{FileMode, SpaceConfig};
use space_core::{BatchOutcome, Delta, Meta, RecordHash, Reference};
use space_crypto::{KdfParams, KeyPair, Keystore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "space",
    version,
    about = "Encrypted file storage client",
    long_about = "space: store, edit, share, tag, and search encrypted files kept as records on an append-only chain"
)]
struct Cli {
    /// Path to space.toml configuration file (default: ~/.space/space.toml)
    #[arg(long, short = 'c', env = "SPACE_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (overrides client.log_format)
    #[arg(long, value_enum, env = "SPACE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a passphrase-protected keystore and publish the alias binding
    Init {
        /// Alias to act as
        alias: String,
    },

    /// Store a local file
    Add {
        file: PathBuf,
        /// File name to record (default: the path's file name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type (default: guessed from the extension)
        #[arg(long = "type", short = 't')]
        mime: Option<String>,
        /// Representation of the content (overrides files.mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// List own files and files shared with you
    List {
        /// Only list files with one of these MIME types
        types: Vec<String>,
    },

    /// Show a file's metadata and tags
    Show { hash: String },

    /// Write a file's current content to a path or stdout
    Get {
        hash: String,
        /// Destination (default: stdout)
        output: Option<PathBuf>,
    },

    /// Append one edit to a file
    ///
    /// Deletes `--delete` bytes at `--offset`, then inserts `--insert` there.
    Amend {
        hash: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 0)]
        delete: u64,
        #[arg(long, default_value = "")]
        insert: String,
    },

    /// Replace a file's content, stored as a single delta
    Set {
        hash: String,
        /// Source of the new content (default: stdin)
        file: Option<PathBuf>,
    },

    /// Grant other aliases read access to a file
    Share {
        hash: String,
        #[arg(required = true)]
        recipients: Vec<String>,
    },

    /// Tag a file, or list its tags when none are given
    Tag { hash: String, tags: Vec<String> },

    /// Search files: bare or `name:` terms match names, `type:` and `tag:` match exactly
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Chunked,
    Delta,
}

impl From<ModeArg> for FileMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Chunked => FileMode::Chunked,
            ModeArg::Delta => FileMode::Delta,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = SpaceConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.client.log_format));
    init_logging(&config.client.log_level, format);

    match cli.command {
        Commands::Init { alias } => cmd_init(&config, &alias),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
        Commands::Add {
            file,
            name,
            mime,
            mode,
        } => {
            let mut client = open_client(&config)?;
            if let Some(mode) = mode {
                client = client.with_mode(mode.into());
            }
            cmd_add(&client, &file, name, mime)
        }
        Commands::List { types } => cmd_list(&open_client(&config)?, &types),
        Commands::Show { hash } => cmd_show(&open_client(&config)?, &hash),
        Commands::Get { hash, output } => cmd_get(&open_client(&config)?, &hash, output.as_deref()),
        Commands::Amend {
            hash,
            offset,
            delete,
            insert,
        } => cmd_amend(
            &open_client(&config)?,
            &hash,
            Delta::new(offset, delete, insert.into_bytes()),
        ),
        Commands::Set { hash, file } => cmd_set(&open_client(&config)?, &hash, file.as_deref()),
        Commands::Share { hash, recipients } => {
            cmd_share(&open_client(&config)?, &hash, &recipients)
        }
        Commands::Tag { hash, tags } => cmd_tag(&open_client(&config)?, &hash, &tags),
        Commands::Search { terms } => cmd_search(&open_client(&config)?, &terms),
    }
}

fn default_config_path() -> PathBuf {
    SpaceConfig::default().client.root.join("space.toml")
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env("SPACE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries file content for `get`
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}

// ── Identity and client setup ─────────────────────────────────────────────────

/// SPACE_PASSWORD wins; otherwise prompt on the terminal.
fn read_passphrase(prompt: &str) -> Result<SecretString> {
    if let Ok(passphrase) = std::env::var("SPACE_PASSWORD") {
        return Ok(SecretString::from(passphrase));
    }
    let passphrase = rpassword::prompt_password(prompt).context("reading passphrase")?;
    Ok(SecretString::from(passphrase))
}

fn open_node(config: &SpaceConfig, alias: String, keys: KeyPair) -> Result<Node> {
    let cache_dir = config.cache_dir();
    let cache = FileCache::open(&cache_dir)
        .with_context(|| format!("opening record cache: {}", cache_dir.display()))?;
    tracing::debug!(alias = %alias, cache = %cache_dir.display(), "node opened");
    if config.network.push {
        tracing::debug!("no peer network configured; network.push is ignored");
    }
    Ok(Node::new(alias, keys, Arc::new(cache), None))
}

fn open_client(config: &SpaceConfig) -> Result<SpaceClient> {
    let keystore_path = config.keystore_path();
    let keystore = Keystore::load(&keystore_path)
        .with_context(|| format!("loading keystore: {}", keystore_path.display()))?;
    let passphrase = read_passphrase(&format!("Passphrase for {}: ", keystore.alias))?;
    let keys = keystore
        .unlock(&passphrase)
        .context("unlocking keystore")?;

    let alias = config
        .client
        .alias
        .clone()
        .unwrap_or_else(|| keystore.alias.clone());
    let node = open_node(config, alias, keys)?;
    let resolver = Arc::new(AliasRegistry::for_node(&node));
    SpaceClient::from_config(node, resolver, config).context("building client")
}

// ── Progress display ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Shows mining progress on a spinner, or logs it when stderr is not a
/// terminal.
struct SpinnerListener {
    bar: Option<ProgressBar>,
    log: LoggingMiningListener,
}

impl SpinnerListener {
    fn new(prefix: &str) -> Self {
        let bar = std::io::stderr()
            .is_terminal()
            .then(|| make_spinner(prefix));
        Self {
            bar,
            log: LoggingMiningListener,
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl MiningListener for SpinnerListener {
    fn on_mining_started(&self, channel: &str, entries: usize) {
        match &self.bar {
            Some(bar) => bar.set_message(format!("mining {entries} records on {channel}")),
            None => self.log.on_mining_started(channel, entries),
        }
    }

    fn on_mining_completed(&self, channel: &str, hash: &RecordHash, block: &Block) {
        match &self.bar {
            Some(bar) => bar.println(format!("  mined {channel} #{} ({hash})", block.length)),
            None => self.log.on_mining_completed(channel, hash, block),
        }
    }
}

// ── `space init` ──────────────────────────────────────────────────────────────

fn cmd_init(config: &SpaceConfig, alias: &str) -> Result<()> {
    let keystore_path = config.keystore_path();
    if keystore_path.exists() {
        anyhow::bail!("keystore already exists: {}", keystore_path.display());
    }

    let passphrase = read_passphrase("New passphrase: ")?;
    if std::env::var_os("SPACE_PASSWORD").is_none() {
        let confirm =
            rpassword::prompt_password("Confirm passphrase: ").context("reading passphrase")?;
        if confirm.as_str() != passphrase.expose_secret() {
            anyhow::bail!("passphrases do not match");
        }
    }

    let (keystore, keys) = Keystore::create(alias, &passphrase, KdfParams::from(&config.crypto))
        .context("creating keystore")?;
    keystore
        .save(&keystore_path)
        .with_context(|| format!("writing keystore: {}", keystore_path.display()))?;

    let node = open_node(config, alias.to_string(), keys)?;
    let listener = SpinnerListener::new("init");
    let registered = AliasRegistry::for_node(&node).register(&node, &listener);
    listener.finish();
    registered.with_context(|| format!("registering alias {alias}"))?;

    println!("Initialized {alias}");
    println!("  public key: {}", keystore.public_key);
    println!("  verify key: {}", keystore.verify_key);
    println!("  keystore:   {}", keystore_path.display());
    Ok(())
}

// ── `space config show` ───────────────────────────────────────────────────────

fn cmd_config_show(config: &SpaceConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    if let Some(note) = push_note(config) {
        println!();
        print!("{note}");
    }
    Ok(())
}

/// `space` never opens a peer network, so an enabled push does nothing.
fn push_note(config: &SpaceConfig) -> Option<&'static str> {
    config.network.push.then_some(
        "# network.push has no effect here: `space` runs without a peer\n\
         # network, so records stay in the local cache.\n",
    )
}

// ── `space add` ───────────────────────────────────────────────────────────────

fn cmd_add(
    client: &SpaceClient,
    file: &Path,
    name: Option<String>,
    mime: Option<String>,
) -> Result<()> {
    let name = name
        .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
        .context("cannot derive a file name; pass --name")?;
    let mime = mime.unwrap_or_else(|| guess_mime(file).to_string());
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );

    let listener = SpinnerListener::new("add");
    let added = client.add(&name, &mime, reader, &listener);
    listener.finish();
    let reference = added.with_context(|| format!("adding {}", file.display()))?;

    println!("Added {name} ({mime})");
    println!("  hash: {}", reference.record_hash);
    Ok(())
}

// ── `space list` / `space show` ───────────────────────────────────────────────

fn cmd_list(client: &SpaceClient, types: &[String]) -> Result<()> {
    let filter = (!types.is_empty()).then(|| TypeFilter::new(types));
    let wanted = |meta: &Meta| filter.as_ref().map_or(true, |f| f.matches(meta));

    let mut count = 0usize;
    for item in client.metas()? {
        let (entry, meta) = item?;
        if wanted(&meta) {
            print_meta(&entry, &meta, None);
            count += 1;
        }
    }
    for shared in client.shared_metas()? {
        if wanted(&shared.meta) {
            print_meta(&shared.entry, &shared.meta, Some(&shared.owner));
            count += 1;
        }
    }
    println!("{count} files");
    Ok(())
}

fn print_meta(entry: &BlockEntry, meta: &Meta, owner: Option<&str>) {
    let shared = owner.map(|o| format!("  (shared by {o})")).unwrap_or_default();
    println!(
        "{}  {:>9}  {:<24}  {}{shared}",
        entry.record_hash,
        fmt_bytes(meta.size),
        meta.mime,
        meta.name
    );
}

fn cmd_show(client: &SpaceClient, hash: &str) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    let source = client.locate(&meta_id)?;
    let entry = source.entry();
    let meta = source.meta();

    println!("hash:    {meta_id}");
    println!("name:    {}", meta.name);
    println!("type:    {}", meta.mime);
    println!("size:    {}", fmt_bytes(meta.size));
    println!("owner:   {}", entry.record.creator);
    println!("created: {}", entry.record.timestamp);
    println!("chunks:  {}", entry.record.references.len());

    let tags: Vec<String> = client
        .tags_for_hash(&meta_id)?
        .into_iter()
        .map(|(_, tag)| tag.value)
        .collect();
    if !tags.is_empty() {
        println!("tags:    {}", tags.join(", "));
    }
    Ok(())
}

// ── `space get` / `space amend` / `space set` ─────────────────────────────────

fn cmd_get(client: &SpaceClient, hash: &str, output: Option<&Path>) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    match output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let written = client.read_file(&meta_id, BufWriter::new(file))?;
            eprintln!("Wrote {} to {}", fmt_bytes(written), path.display());
        }
        None => {
            let stdout = io::stdout();
            client.read_file(&meta_id, stdout.lock())?;
        }
    }
    Ok(())
}

fn cmd_amend(client: &SpaceClient, hash: &str, delta: Delta) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    let listener = SpinnerListener::new("amend");
    let amended = client.amend(&meta_id, delta, &listener);
    listener.finish();
    let reference = amended.with_context(|| format!("amending {meta_id}"))?;

    println!("Amended {meta_id}");
    println!("  delta: {}", reference.record_hash);
    Ok(())
}

fn cmd_set(client: &SpaceClient, hash: &str, file: Option<&Path>) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    let reader: Box<dyn Read> = match file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let listener = SpinnerListener::new("set");
    let written = client.write_file(&meta_id, reader, &listener);
    listener.finish();
    match written.with_context(|| format!("writing {meta_id}"))? {
        Some(reference) => println!("Updated {meta_id}\n  delta: {}", reference.record_hash),
        None => println!("{meta_id} unchanged"),
    }
    Ok(())
}

// ── `space share` / `space tag` / `space search` ──────────────────────────────

fn cmd_share(client: &SpaceClient, hash: &str, recipients: &[String]) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    let listener = SpinnerListener::new("share");
    let outcome = client.share(&meta_id, recipients, &listener);
    listener.finish();
    report_outcome("Shared with", outcome?)
}

fn cmd_tag(client: &SpaceClient, hash: &str, tags: &[String]) -> Result<()> {
    let meta_id = parse_hash(hash)?;
    if tags.is_empty() {
        for (_, tag) in client.tags_for_hash(&meta_id)? {
            println!("{}", tag.value);
        }
        return Ok(());
    }

    let listener = SpinnerListener::new("tag");
    let outcome = client.add_tag(&meta_id, tags, &listener);
    listener.finish();
    report_outcome("Tagged", outcome?)
}

fn report_outcome(verb: &str, outcome: BatchOutcome<Reference>) -> Result<()> {
    for (item, reference) in &outcome.succeeded {
        println!("{verb} {item}  ({})", reference.record_hash);
    }
    for (item, e) in &outcome.failed {
        eprintln!("  failed {item}: {e}");
    }
    let total = outcome.total();
    outcome
        .into_result()
        .map(|_| ())
        .with_context(|| format!("{verb} ({total} requested)"))
}

fn cmd_search(client: &SpaceClient, terms: &[String]) -> Result<()> {
    let query = SearchQuery::parse(terms);
    let hits = client.search(&query)?;
    for hit in &hits {
        print!("[{}] ", hit.matches);
        print_meta(&hit.entry, &hit.meta, hit.shared_by.as_deref());
    }
    println!("{} files", hits.len());
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn parse_hash(text: &str) -> Result<RecordHash> {
    text.parse()
        .with_context(|| format!("invalid file hash: {text}"))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "toml" => "application/toml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
