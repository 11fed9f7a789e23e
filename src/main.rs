//! Unrpa CLI - Command-line tool for Ren'Py RPA archives.
//!
//! This is the main entry point for the unrpa command-line application.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::Level;

use unrpa::prelude::*;

/// Unrpa - list and extract Ren'Py RPA archives
#[derive(Parser)]
#[command(name = "unrpa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors and hide the progress bar
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from an archive
    Extract {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Output directory
        #[arg(short, long, env = "UNRPA_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Create the output directory if it does not exist
        #[arg(short, long)]
        mkdir: bool,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Keep going when a file fails to extract
        #[arg(long)]
        continue_on_error: bool,

        /// Extract files on all cores
        #[arg(short, long)]
        parallel: bool,
    },

    /// List the files in an archive
    List {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Print entries as JSON with their offsets and lengths
        #[arg(long)]
        json: bool,
    },

    /// Print the files in an archive as a directory tree
    Tree {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// List the supported archive versions
    Versions,
}

/// How to find and open an archive.
#[derive(Args)]
struct ArchiveArgs {
    /// Path to the archive (the .rpi index for RPA-1.0)
    #[arg(env = "UNRPA_ARCHIVE")]
    archive: PathBuf,

    /// Force an archive version instead of detecting it
    #[arg(long = "version", value_name = "NAME")]
    format: Option<String>,

    /// Index offset in hex, bypassing the header
    #[arg(long, value_name = "HEX", value_parser = parse_hex_arg)]
    offset: Option<u64>,

    /// Index key in hex, used with --offset
    #[arg(long, value_name = "HEX", value_parser = parse_hex_arg, requires = "offset")]
    key: Option<u64>,
}

fn parse_hex_arg(value: &str) -> std::result::Result<u64, String> {
    parse_hex(value.as_bytes()).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Extract {
            archive,
            output,
            mkdir,
            filter,
            continue_on_error,
            parallel,
        } => {
            let options = ExtractSettings {
                filter: filter.as_deref(),
                continue_on_error,
                parallel,
                quiet: cli.quiet,
            };
            cmd_extract(&archive, &output, mkdir, &options)?;
        }
        Commands::List { archive, json } => {
            cmd_list(&archive, json)?;
        }
        Commands::Tree { archive } => {
            cmd_tree(&archive)?;
        }
        Commands::Versions => {
            cmd_versions();
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Open the archive, honouring a forced version and a known offset/key.
fn open_archive(args: &ArchiveArgs) -> Result<RpaArchive> {
    let registry = VersionRegistry::builtin();
    let override_offset = args.offset.map(|offset| OffsetAndKey::new(offset, args.key));

    let archive = match (&args.format, override_offset) {
        (Some(name), override_offset) => {
            let version = registry.by_name(name)?;
            RpaArchive::open_with(&args.archive, version, override_offset)
        }
        (None, Some(override_offset)) => {
            // A known offset usually means an unrecognized header.
            let version = match registry.detect_file(&args.archive) {
                Ok(version) => version,
                Err(_) => registry.by_name("RPA-3.0")?,
            };
            RpaArchive::open_with(&args.archive, version, Some(override_offset))
        }
        (None, None) => RpaArchive::open_in(&args.archive, &registry),
    };

    archive.with_context(|| format!("Failed to open archive {}", args.archive.display()))
}

struct ExtractSettings<'a> {
    filter: Option<&'a str>,
    continue_on_error: bool,
    parallel: bool,
    quiet: bool,
}

fn cmd_extract(args: &ArchiveArgs, output: &Path, mkdir: bool, settings: &ExtractSettings<'_>) -> Result<()> {
    let start = Instant::now();
    let archive = open_archive(args)?;

    if !settings.quiet {
        println!(
            "Opened {} ({}): {} entries in {:?}",
            archive.name(),
            archive.version().name(),
            archive.entry_count(),
            start.elapsed()
        );
    }

    if mkdir {
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create output directory {}", output.display()))?;
    }

    let mut options = ExtractOptions::new().continue_on_error(settings.continue_on_error);
    let mut selected = archive.entry_count();
    if let Some(filter) = settings.filter {
        let pattern = Pattern::new(filter).context("Invalid filter pattern")?;
        selected = archive
            .iter()
            .filter(|(path, _)| pattern.matches_path(Path::new(path)))
            .count();
        options = options.filter(pattern);
    }

    let pb = if settings.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(selected as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {wide_msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let tick = |path: &str| {
        pb.set_message(path.to_string());
        pb.inc(1);
    };
    let report = if settings.parallel {
        archive.extract_parallel(output, &options, tick)
    } else {
        archive.extract_with(output, &options, tick)
    }
    .context("Extraction failed")?;

    pb.finish_and_clear();

    for failure in &report.failures {
        eprintln!("Error extracting {}: {}", failure.path, failure.error);
    }

    if !settings.quiet {
        println!(
            "Extracted {} files ({} bytes) in {:?} ({} errors, {} skipped)",
            report.extracted,
            report.bytes,
            start.elapsed(),
            report.failures.len(),
            report.skipped
        );
    }

    if !report.is_complete() {
        anyhow::bail!("{} files could not be extracted", report.failures.len());
    }

    Ok(())
}

/// One entry of the JSON listing.
#[derive(Serialize)]
struct ListedEntry<'a> {
    path: &'a str,
    offset: u64,
    length: u64,
    prefix_len: usize,
    parts: usize,
}

fn cmd_list(args: &ArchiveArgs, json: bool) -> Result<()> {
    let archive = open_archive(args)?;
    let paths = archive.list();

    if !json {
        for path in &paths {
            println!("{path}");
        }
        return Ok(());
    }

    let mut listed = Vec::with_capacity(paths.len());
    for path in &paths {
        let Some(entry) = archive.index().get(path) else {
            continue;
        };
        let (offset, length, prefix_len) = entry
            .first()
            .map(|part| (part.offset, part.length, part.prefix.len()))
            .unwrap_or_default();

        listed.push(ListedEntry {
            path,
            offset,
            length,
            prefix_len,
            parts: entry.parts().len(),
        });
    }

    println!("{}", serde_json::to_string_pretty(&listed)?);
    Ok(())
}

/// Directory node of the tree listing.
#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn insert(&mut self, path: &str) {
        let mut node = self;
        for part in path.split(MAIN_SEPARATOR).filter(|p| !p.is_empty()) {
            node = node.children.entry(part.to_string()).or_default();
        }
    }

    fn print(&self, depth: usize) {
        for (name, child) in &self.children {
            if child.children.is_empty() {
                println!("{:indent$}{name}", "", indent = depth * 2);
            } else {
                println!("{:indent$}{name}{MAIN_SEPARATOR}", "", indent = depth * 2);
                child.print(depth + 1);
            }
        }
    }
}

fn cmd_tree(args: &ArchiveArgs) -> Result<()> {
    let archive = open_archive(args)?;

    let mut root = TreeNode::default();
    for path in archive.list() {
        root.insert(&path);
    }

    println!("{}", archive.name());
    root.print(1);

    Ok(())
}

fn cmd_versions() {
    for version in VersionRegistry::builtin().names() {
        println!("{version}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_extract() {
        let cli = Cli::try_parse_from([
            "unrpa",
            "extract",
            "game.rpa",
            "-o",
            "out",
            "--offset",
            "0x1000",
            "--key",
            "42424242",
            "--continue-on-error",
        ])
        .unwrap();

        match cli.command {
            Commands::Extract {
                archive,
                output,
                continue_on_error,
                ..
            } => {
                assert_eq!(archive.archive, PathBuf::from("game.rpa"));
                assert_eq!(archive.offset, Some(0x1000));
                assert_eq!(archive.key, Some(0x4242_4242));
                assert_eq!(output, PathBuf::from("out"));
                assert!(continue_on_error);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_key_requires_offset() {
        assert!(Cli::try_parse_from(["unrpa", "list", "game.rpa", "--key", "ff"]).is_err());
        assert!(Cli::try_parse_from(["unrpa", "list", "game.rpa", "--offset", "zz"]).is_err());
    }

    #[test]
    fn test_forced_version_flag() {
        let cli = Cli::try_parse_from(["unrpa", "tree", "game.rpa", "--version", "RPA-2.0"]).unwrap();
        match cli.command {
            Commands::Tree { archive } => assert_eq!(archive.format.as_deref(), Some("RPA-2.0")),
            _ => panic!("expected tree"),
        }
    }

    #[test]
    fn test_tree_nodes() {
        let mut root = TreeNode::default();
        root.insert(&format!("images{MAIN_SEPARATOR}bg.png"));
        root.insert(&format!("images{MAIN_SEPARATOR}fg.png"));
        root.insert("script.rpyc");

        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children["images"].children.len(), 2);
        assert!(root.children["script.rpyc"].children.is_empty());
    }
}
