//! CLI binary for md2cms.
//!
//! A thin shim over the library crate that maps CLI flags and the persisted
//! settings file to `UploadConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use md2cms::{
    sync_document, ExtractionPolicy, ImageStatus, ProgressCallback, ResolutionPolicy, Settings,
    SyncOutput, SyncPhase, SyncProgressCallback, SyncStatus, UploadConfig, VaultStore,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while scanning, then a bar across
/// the upload batch with one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
    /// Set once the upload batch size is known and the bar has a length.
    uploading: AtomicBool,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
            uploading: AtomicBool::new(false),
        })
    }

    /// Switch to the full progress-bar style once the batch size is known.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Uploading");
        self.uploading.store(true, Ordering::SeqCst);
    }

    fn advance(&self) {
        if self.uploading.load(Ordering::SeqCst) {
            self.bar.inc(1);
        }
    }
}

impl SyncProgressCallback for CliProgressCallback {
    fn on_sync_start(&self, note: &str) {
        self.bar.println(format!("{} {}", cyan("◆"), bold(note)));
    }

    fn on_phase(&self, phase: SyncPhase) {
        match phase {
            SyncPhase::Uploading { images } => self.activate_bar(images),
            other => self.bar.set_message(other.to_string()),
        }
    }

    fn on_image_start(&self, _index: usize, _total: usize, reference: &str) {
        self.bar.set_message(reference.to_string());
    }

    fn on_image_uploaded(&self, index: usize, total: usize, reference: &str, url: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            reference,
            dim(url),
        ));
        self.advance();
    }

    fn on_image_error(&self, index: usize, total: usize, reference: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            reference,
            red(&msg),
        ));
        self.advance();
    }

    fn on_nothing_uploaded(&self, found: usize) {
        self.bar.finish_and_clear();
        if found == 0 {
            eprintln!("{} No images found", cyan("⚠"));
        } else {
            eprintln!(
                "{} No images uploaded ({} reference(s) found)",
                red("✘"),
                found
            );
        }
    }

    fn on_sync_complete(&self, uploaded: usize, attempted: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} image(s) uploaded and links updated",
                green("✔"),
                bold(&uploaded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) uploaded  ({} failed)",
                cyan("⚠"),
                bold(&uploaded.to_string()),
                attempted,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Save the CMS URL and token once
  md2cms config set-url https://cms.example.com
  md2cms config set-token 4f1c...

  # Upload the images of one note and rewrite its links
  md2cms upload --vault ~/notes posts/trip.md

  # Preview: upload, print the rewritten note, leave the vault untouched
  md2cms upload --vault ~/notes --dry-run posts/trip.md

  # Only ![[...]] embeds of raster images, matched by file name anywhere in the vault
  md2cms upload --extract image-embeds --resolve file-name posts/trip.md

  # Machine-readable report
  md2cms upload --json posts/*.md > report.json

ENVIRONMENT VARIABLES:
  MD2CMS_URL       CMS base URL (overrides the settings file)
  MD2CMS_TOKEN     API token (overrides the settings file)
  MD2CMS_VAULT     Vault root directory
  MD2CMS_CONFIG    Settings file location
  RUST_LOG         Log filter, e.g. md2cms=debug
"#;

/// Upload images referenced by Markdown notes to a CMS and rewrite the links.
#[derive(Parser, Debug)]
#[command(
    name = "md2cms",
    version,
    about = "Upload images referenced by Markdown notes to a CMS and rewrite the links",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Settings file [default: <config dir>/md2cms/settings.toml].
    #[arg(long, global = true, env = "MD2CMS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MD2CMS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MD2CMS_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the images of one or more notes and rewrite their links.
    Upload(UploadArgs),

    /// Show or change the persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Notes to process, as paths on disk or relative to the vault root.
    #[arg(required = true)]
    notes: Vec<PathBuf>,

    /// Vault root directory.
    #[arg(long, env = "MD2CMS_VAULT", default_value = ".")]
    vault: PathBuf,

    /// CMS base URL (overrides the settings file).
    #[arg(long, env = "MD2CMS_URL")]
    url: Option<String>,

    /// API token (overrides the settings file).
    #[arg(long, env = "MD2CMS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Which image syntaxes to pick up.
    #[arg(long, value_enum, default_value = "links-and-embeds")]
    extract: ExtractArg,

    /// How references are matched to vault files.
    #[arg(long, value_enum, default_value = "direct-or-relative")]
    resolve: ResolveArg,

    /// Per-upload timeout in seconds (default: none).
    #[arg(long, env = "MD2CMS_TIMEOUT", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Prefix server-relative URLs (/uploads/…) with the base URL.
    #[arg(long)]
    absolute_urls: bool,

    /// Upload and print the rewritten note, but do not modify the vault.
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON report instead of human-readable output.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2CMS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum ConfigAction {
    /// Print the current settings (token masked).
    Show,
    /// Print the settings file location.
    Path,
    /// Set the CMS base URL.
    SetUrl { url: String },
    /// Set the API token.
    SetToken { token: String },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ExtractArg {
    LinksAndEmbeds,
    ImageEmbeds,
}

impl From<ExtractArg> for ExtractionPolicy {
    fn from(v: ExtractArg) -> Self {
        match v {
            ExtractArg::LinksAndEmbeds => ExtractionPolicy::LinksAndEmbeds,
            ExtractArg::ImageEmbeds => ExtractionPolicy::ImageEmbedsOnly,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ResolveArg {
    DirectOrRelative,
    FileName,
}

impl From<ResolveArg> for ResolutionPolicy {
    fn from(v: ResolveArg) -> Self {
        match v {
            ResolveArg::DirectOrRelative => ResolutionPolicy::DirectOrRelative,
            ResolveArg::FileName => ResolutionPolicy::FileName,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Upload(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Config { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let settings_path = match cli.config.clone() {
        Some(p) => p,
        None => Settings::default_path()
            .context("Could not determine a config directory; pass --config <FILE>")?,
    };

    match &cli.command {
        Command::Config { action } => run_config(&settings_path, action.clone()),
        Command::Upload(args) => run_upload(&cli, args, &settings_path, show_progress).await,
    }
}

/// `md2cms config …`: every change is persisted immediately.
fn run_config(path: &Path, action: ConfigAction) -> Result<()> {
    let mut settings = Settings::load(path).context("Failed to load settings")?;

    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            println!("Settings file:  {}", path.display());
            println!(
                "CMS URL:        {}",
                if settings.remote_base_url.is_empty() {
                    dim("<not set>")
                } else {
                    settings.remote_base_url.clone()
                }
            );
            println!(
                "API token:      {}",
                if settings.api_token.is_empty() {
                    dim("<not set>")
                } else {
                    mask(&settings.api_token)
                }
            );
        }
        ConfigAction::SetUrl { url } => {
            // Validate through the builder so bad schemes are caught now.
            UploadConfig::builder()
                .base_url(url.trim())
                .build()
                .context("Invalid URL")?;
            settings.remote_base_url = url.trim().to_string();
            settings.save(path).context("Failed to save settings")?;
            eprintln!("{} CMS URL saved to {}", green("✔"), path.display());
        }
        ConfigAction::SetToken { token } => {
            settings.api_token = token.trim().to_string();
            settings.save(path).context("Failed to save settings")?;
            eprintln!("{} API token saved to {}", green("✔"), path.display());
        }
    }
    Ok(())
}

/// `md2cms upload …`: notes are processed one after another.
async fn run_upload(
    cli: &Cli,
    args: &UploadArgs,
    settings_path: &Path,
    show_progress: bool,
) -> Result<()> {
    let settings = Settings::load(settings_path).context("Failed to load settings")?;
    let base = build_config(args, &settings)?;

    // Refuse to start before touching the vault or the network.
    base.validate()?;

    let vault = VaultStore::open(&args.vault).context("Failed to open vault")?;

    let mut outputs: Vec<SyncOutput> = Vec::with_capacity(args.notes.len());
    let mut failures = 0usize;

    for note_arg in &args.notes {
        let note = note_path_in_vault(&vault, note_arg);

        let mut config = base.clone();
        let cli_cb = show_progress.then(CliProgressCallback::new);
        if let Some(ref cb) = cli_cb {
            config.progress_callback = Some(Arc::clone(cb) as ProgressCallback);
        }

        match sync_document(&vault, &note, &config).await {
            Ok(output) => {
                if !args.json {
                    print_summary(cli, args, &output, show_progress)?;
                }
                outputs.push(output);
            }
            Err(e) => {
                if let Some(ref cb) = cli_cb {
                    cb.bar.finish_and_clear();
                }
                failures += 1;
                eprintln!("{} {}: {}", red("✘"), bold(&note), e);
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&outputs).context("Failed to serialise report")?;
        println!("{json}");
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} note(s) failed", args.notes.len());
    }
    Ok(())
}

/// Map CLI args and settings to `UploadConfig`. Flags win over settings.
fn build_config(args: &UploadArgs, settings: &Settings) -> Result<UploadConfig> {
    let mut builder = UploadConfig::builder()
        .settings(settings)
        .extraction(args.extract.clone().into())
        .resolution(args.resolve.clone().into())
        .absolute_urls(args.absolute_urls)
        .dry_run(args.dry_run);

    if let Some(ref url) = args.url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref token) = args.token {
        builder = builder.api_token(token.clone());
    }
    if let Some(secs) = args.timeout {
        builder = builder.request_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}

/// Accept a path on disk inside the vault, or a vault-relative path.
fn note_path_in_vault(vault: &VaultStore, arg: &Path) -> String {
    if arg.exists() {
        if let Some(p) = vault.vault_path_of(arg) {
            return p;
        }
    }
    arg.to_string_lossy().replace('\\', "/")
}

fn print_summary(cli: &Cli, args: &UploadArgs, output: &SyncOutput, show_progress: bool) -> Result<()> {
    if args.dry_run && output.status == SyncStatus::Rewritten {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.markdown.ends_with('\n') {
            handle
                .write_all(b"\n")
                .context("Failed to write to stdout")?;
        }
    }

    // The progress callback already printed per-image lines and a verdict.
    if cli.quiet || show_progress {
        return Ok(());
    }

    for image in &output.images {
        match &image.status {
            ImageStatus::Uploaded { url } => {
                eprintln!("  {} {}  {}", green("✓"), image.reference, dim(url))
            }
            ImageStatus::Failed { error } => eprintln!("  {} {}", red("✗"), red(&error.to_string())),
            ImageStatus::Unresolved => {
                eprintln!("  {} {}  {}", dim("·"), image.reference, dim("not found in vault"))
            }
        }
    }

    let s = &output.stats;
    match output.status {
        SyncStatus::NothingUploaded => eprintln!(
            "{} {}: no images found or uploaded",
            cyan("⚠"),
            output.note
        ),
        SyncStatus::Rewritten => eprintln!(
            "{} {}: {}/{} image(s) uploaded in {}ms{}",
            if s.failed == 0 { green("✔") } else { cyan("⚠") },
            output.note,
            s.uploaded,
            s.resolved,
            s.total_duration_ms,
            if output.written { "" } else { " (dry run, vault unchanged)" },
        ),
    }
    Ok(())
}

/// Show only the last four characters of a secret.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
