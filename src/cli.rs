//! CLI argument parsing and command handlers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::extractor;
use crate::filter::{self, UrlFilter};
use crate::output;
use crate::pipeline::BatchPipeline;
use crate::source::FixDataset;
use crate::store::UrlStore;

/// vulnurl: mine URLs from source-code comments in vulnerability-fix datasets
#[derive(Parser, Debug)]
#[command(
    name = "vulnurl",
    version,
    about = "Extract URLs from code comments in vulnerability-fix datasets",
    long_about = "vulnurl scans the comments of every file touched by a vulnerability fix, \
                  extracts the URLs they reference, and stores them alongside the fix's CWE \
                  classifications. A second pass copies an allow-listed subset into a \
                  curated store."
)]
pub struct Cli {
    /// Enable verbose logging (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./vulnurl.toml when present)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract comment URLs from a single source file
    ///
    /// Examples:
    ///   vulnurl extract parser.c --lang C
    ///   vulnurl extract app.py --lang Python --comments --pretty
    Extract {
        /// Source file to scan
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Language tag: C, Java, C++, JavaScript, Go, TypeScript, PHP, Python, Ruby
        #[arg(short, long)]
        lang: String,

        /// Print the extracted comments instead of URLs
        #[arg(long)]
        comments: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Mine comment URLs from a fix dataset into a URL store
    Mine {
        /// Fix dataset (SQLite) to read
        #[arg(short, long, value_name = "DB")]
        source: PathBuf,

        /// URL store (SQLite) to write; created if missing
        #[arg(short, long, value_name = "DB")]
        dest: PathBuf,

        /// Rows fetched per batch (overrides the config file)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Suppress progress bar and summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Copy the allow-listed subset of a URL store into another store
    Filter {
        /// URL store produced by `mine`
        #[arg(short, long, value_name = "DB")]
        source: PathBuf,

        /// Filtered store to write; created if missing
        #[arg(short, long, value_name = "DB")]
        dest: PathBuf,
    },

    /// Write a default config file
    Init {
        #[arg(value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // Setup logging based on verbosity
        let log_level = match self.verbose {
            0 => "warn",   // Default: only warnings and errors
            1 => "info",   // -v: show info messages
            2 => "debug",  // -vv: show debug messages
            _ => "trace",  // -vvv: show trace messages
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .init();

        match self.command {
            Command::Extract { file, lang, comments, pretty } => {
                handle_extract(&file, &lang, comments, pretty)
            }
            Command::Mine { source, dest, batch_size, quiet } => {
                handle_mine(self.config.as_deref(), &source, &dest, batch_size, quiet)
            }
            Command::Filter { source, dest } => handle_filter(self.config.as_deref(), &source, &dest),
            Command::Init { path } => handle_init(&path),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn handle_extract(file: &Path, lang: &str, comments: bool, pretty: bool) -> Result<()> {
    log::info!("Extracting from {} as {}", file.display(), lang);

    let code = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let json = if comments {
        to_json(&extractor::extract_comments(&code, lang)?, pretty)?
    } else {
        to_json(&extractor::extract_comment_urls(&code, lang)?, pretty)?
    };

    println!("{}", json);
    Ok(())
}

fn handle_mine(
    config_path: Option<&Path>,
    source: &Path,
    dest: &Path,
    batch_size: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut pipeline_config = config.pipeline;
    if let Some(n) = batch_size {
        if n == 0 {
            anyhow::bail!("--batch-size must be greater than zero");
        }
        pipeline_config.batch_size = n;
    }

    let start = Instant::now();
    let dataset = FixDataset::open(source)?;
    let store = UrlStore::open(dest)?;

    let mut pipeline = BatchPipeline::new(store, pipeline_config);
    let stats = pipeline.run(&dataset, !quiet)?;
    let counts = pipeline.store().counts()?;

    if !quiet {
        output::info(&format!(
            "Processed {} rows in {:.1?}: {} files scanned, {} with URLs, {} unsupported.\n\
             Store now holds {} URLs across {} file changes.",
            stats.rows,
            start.elapsed(),
            stats.files_scanned,
            stats.files_with_urls,
            stats.unsupported_files,
            counts.urls,
            counts.file_changes,
        ));
    }
    Ok(())
}

fn handle_filter(config_path: Option<&Path>, source: &Path, dest: &Path) -> Result<()> {
    if source == dest {
        anyhow::bail!("Source and destination stores must differ");
    }
    if !source.exists() {
        anyhow::bail!("URL store not found: {}. Run 'vulnurl mine' first.", source.display());
    }

    let config = Config::load(config_path)?;
    let url_filter = UrlFilter::from_config(&config.filter)?;

    let source_store = UrlStore::open(source)?;
    let mut dest_store = UrlStore::open(dest)?;

    let stats = filter::run_filter(&source_store, &mut dest_store, &url_filter)?;
    if stats.urls_kept == 0 {
        output::warn("No URLs matched the filter rules.");
    }

    output::info(&format!(
        "Filtering and copying complete: kept {} of {} URLs, {} file changes, {} CWEs.",
        stats.urls_kept, stats.urls_seen, stats.file_changes_kept, stats.cwes_kept
    ));
    Ok(())
}

fn handle_init(path: &Path) -> Result<()> {
    Config::write_default(path)?;
    output::info(&format!("Wrote default config to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from(["vulnurl", "extract", "a.c", "--lang", "C++", "--pretty"]).unwrap();
        match cli.command {
            Command::Extract { file, lang, comments, pretty } => {
                assert_eq!(file, PathBuf::from("a.c"));
                assert_eq!(lang, "C++");
                assert!(!comments);
                assert!(pretty);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_mine_with_global_flags() {
        let cli = Cli::try_parse_from([
            "vulnurl", "mine", "-s", "fixes.db", "-d", "urls.db", "-b", "100", "-vv", "--config", "x.toml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Mine { batch_size: Some(100), .. }));
    }

    #[test]
    fn test_extract_requires_lang() {
        assert!(Cli::try_parse_from(["vulnurl", "extract", "a.c"]).is_err());
    }

    #[test]
    fn test_init_default_path() {
        let cli = Cli::try_parse_from(["vulnurl", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init { ref path } if path == Path::new(DEFAULT_CONFIG_FILE)));
    }
}
