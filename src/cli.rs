//! Command-line interface for mded-lsp.

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::Url;
use tower_lsp::{LspService, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use crate::detect::DiagnosticRecord;
use crate::document::TextDocument;
use crate::report::{self, CheckReport};
use crate::server::Backend;
use crate::settings::{ClientFlags, SettingsStore, ValidationSettings, DEFAULT_MAX_PROBLEMS};
use crate::validate::{CollectingTransport, Validator};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Glob used by `check` when no `--include` is given.
pub const DEFAULT_INCLUDE: &str = "**/*.mded";

/// Language server for mded documents.
///
/// With no subcommand the server speaks LSP over stdin/stdout. Logs go to
/// stderr and honour `RUST_LOG`.
#[derive(Parser)]
#[command(name = "mded-lsp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Accepted for clients that pass it; stdio is the only transport
    #[arg(long, hide = true)]
    pub stdio: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the language server on stdin/stdout
    Serve,
    /// Validate mded files once and print the diagnostics
    Check(CheckArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to check (file or directory)
    pub path: PathBuf,

    /// Dictionary file for every document (default: dictionary.mded.json beside each file)
    #[arg(short, long)]
    pub dictionary: Option<PathBuf>,

    /// Maximum diagnostics per file
    #[arg(long, default_value_t = DEFAULT_MAX_PROBLEMS, value_parser = parse_max_problems)]
    pub max_problems: usize,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Glob of files to check inside a directory (repeatable)
    #[arg(short, long, default_value = DEFAULT_INCLUDE)]
    pub include: Vec<String>,

    /// Attach related information to diagnostics
    #[arg(long)]
    pub related_information: bool,
}

fn parse_max_problems(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Install the stderr tracing subscriber.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "mded_lsp=debug" } else { "mded_lsp=info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Run the language server until the client disconnects.
pub fn run_serve() -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        tracing::info!("starting mded language server");

        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let (service, socket) = LspService::new(Backend::new);
        Server::new(stdin, stdout, socket).serve(service).await;
    });
    Ok(EXIT_SUCCESS)
}

/// Build a glob set from `--include` patterns.
pub fn build_globs(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob {:?}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Collect files under `root` whose root-relative path matches `include`.
pub fn collect_files(root: &Path, include: &GlobSet) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            // Skip hidden directories
            !(e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name().to_string_lossy().starts_with('.'))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if include.is_match(relative) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

/// Files validated concurrently by `check`.
const CHECK_CONCURRENCY: usize = 16;

/// Settings shared by every file of a `check` run.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub settings: ValidationSettings,
    pub related_information: bool,
    /// Dictionary for every file instead of each file's sidecar
    pub dictionary: Option<PathBuf>,
}

impl CheckOptions {
    /// A validator with its own registry, as an editor session would have.
    fn validator(&self) -> Validator {
        let settings = SettingsStore::new(
            ClientFlags {
                related_information: self.related_information,
                ..Default::default()
            },
            self.settings,
        );
        let validator = Validator::new().with_settings(settings);
        match &self.dictionary {
            Some(path) => validator.with_dictionary(path),
            None => validator,
        }
    }
}

async fn check_file(
    options: &CheckOptions,
    path: &Path,
) -> anyhow::Result<(Url, Vec<DiagnosticRecord>)> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let uri = Url::from_file_path(path)
        .map_err(|_| anyhow::anyhow!("not an absolute path: {}", path.display()))?;

    let transport = CollectingTransport::new();
    let document = TextDocument::new(uri.clone(), 0, text);
    options.validator().validate(&document, &transport).await;

    let diagnostics = transport
        .into_results()
        .into_iter()
        .next()
        .map(|(_, diagnostics)| diagnostics)
        .unwrap_or_default();
    Ok((uri, diagnostics))
}

/// Validate files and return their diagnostics, sorted by URI.
///
/// Every file gets a fresh registry, so a directory without a dictionary
/// never sees functions loaded for another directory.
pub async fn check_files(
    options: &CheckOptions,
    files: &[PathBuf],
) -> anyhow::Result<Vec<(Url, Vec<DiagnosticRecord>)>> {
    let results: Vec<_> = stream::iter(files)
        .map(|path| check_file(options, path))
        .buffer_unordered(CHECK_CONCURRENCY)
        .collect()
        .await;

    let mut published = results.into_iter().collect::<anyhow::Result<Vec<_>>>()?;
    published.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Ok(published)
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let files = if abs_path.is_dir() {
        let include = match build_globs(&args.include) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return Ok(EXIT_ERROR);
            }
        };
        collect_files(&abs_path, &include)?
    } else {
        vec![abs_path.clone()]
    };

    if files.is_empty() {
        eprintln!("Warning: no files to check");
        return Ok(EXIT_SUCCESS);
    }

    if let Some(dictionary) = &args.dictionary {
        if !dictionary.is_file() {
            eprintln!("Error: dictionary not found: {}", dictionary.display());
            return Ok(EXIT_ERROR);
        }
    }
    let options = CheckOptions {
        settings: ValidationSettings {
            max_number_of_problems: args.max_problems,
        },
        related_information: args.related_information,
        dictionary: args.dictionary.clone(),
    };

    tracing::debug!(files = files.len(), path = %abs_path.display(), "checking files");
    let runtime = tokio::runtime::Runtime::new()?;
    let results = runtime.block_on(check_files(&options, &files))?;

    let path_str = args.path.to_string_lossy().to_string();
    let report = CheckReport::new(&path_str, &abs_path, results);

    match args.format.as_str() {
        "json" => report::write_json(&report)?,
        _ => report::write_pretty(&report),
    }

    if report.has_errors() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}
