//! Main entry point for the arcgz CLI application.
//!
//! This binary lists, creates, appends to and extracts multi-member gzip
//! archives while keeping every header field visible.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;

use arcgz::cli::{
    ExistingFile, Mode, check_target, format_entry, plan_extraction, tolerate_trailing,
};
use arcgz::{Cli, Entry, GzipExtractor, GzipWriter};

/// Application entry point.
///
/// Parses command-line arguments and dispatches on the selected mode.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.mode() {
        Some(Mode::List(archive)) => list_members(archive, &cli).await,
        Some(Mode::Create(archive)) => {
            let writer = GzipWriter::create(archive)
                .await
                .with_context(|| format!("cannot create {}", archive.display()))?;
            add_members(writer, &cli).await
        }
        Some(Mode::Append(archive)) => {
            let writer = GzipWriter::append(archive)
                .await
                .with_context(|| format!("cannot open {}", archive.display()))?;
            add_members(writer, &cli).await
        }
        Some(Mode::Extract(archive)) => extract_members(archive, &cli).await,
        None => bail!("one of -l, -c, -a or -d is required"),
    }
}

/// Decode every member of `archive`.
///
/// Trailing bytes that are not another member are reported and dropped. Any
/// other failure is returned after `on_partial` has seen the members decoded
/// before it.
async fn read_entries(
    archive: &Path,
    cli: &Cli,
    on_partial: impl Fn(&[Entry]),
) -> Result<(GzipExtractor, Vec<Entry>)> {
    let extractor = GzipExtractor::open(archive)
        .await
        .with_context(|| format!("cannot read {}", archive.display()))?;

    match tolerate_trailing(extractor.list_members()) {
        Ok(listing) => {
            if let Some(ignored) = listing.ignored {
                if !cli.is_very_quiet() {
                    eprintln!("Warning: {}: {}", archive.display(), ignored.source);
                }
            }
            Ok((extractor, listing.entries))
        }
        Err(partial) => {
            on_partial(&partial.entries);
            Err(anyhow::Error::new(partial))
                .with_context(|| format!("cannot read {}", archive.display()))
        }
    }
}

/// Print a block of header fields for every member.
///
/// Members decoded before a failure are still printed.
async fn list_members(archive: &Path, cli: &Cli) -> Result<()> {
    let print_all = |entries: &[Entry]| entries.iter().for_each(|e| print!("{}", format_entry(e)));

    let (_, entries) = read_entries(archive, cli, print_all).await?;
    print_all(&entries);
    Ok(())
}

/// Add `--content` or every target file, then flush the archive.
async fn add_members(mut writer: GzipWriter, cli: &Cli) -> Result<()> {
    let options = cli.add_options()?;

    if let Some(data) = cli.content_bytes()? {
        writer.add_data(&data, &options).await?;
        writer.finish().await?;
        return Ok(());
    }

    if cli.targets.is_empty() {
        bail!("no target files given (use --content to store a string)");
    }

    for target in &cli.targets {
        let path = Path::new(target);
        if let Some(reason) = check_target(path, writer.path()) {
            if !cli.is_very_quiet() {
                eprintln!("Skipping: {} ({})", target, reason);
            }
            continue;
        }

        if !cli.is_quiet() {
            println!("  adding: {}", target);
        }
        writer
            .add_file(path, &options)
            .await
            .with_context(|| format!("cannot add {}", target))?;
    }

    writer.finish().await?;
    Ok(())
}

/// Extract the named members, or every distinct name present.
///
/// When a name occurs more than once the last member wins, matching what a
/// later `-a` of the same file means.
async fn extract_members(archive: &Path, cli: &Cli) -> Result<()> {
    let (extractor, entries) = read_entries(archive, cli, |_| {}).await?;
    let plan = plan_extraction(&entries, &cli.targets)?;

    for item in plan {
        if cli.pipe {
            extractor.extract_to_stdout(item.entry).await?;
            continue;
        }

        // Stored names are never trusted as paths.
        let Some(output_path) = item.output else {
            if !cli.is_very_quiet() {
                eprintln!("Skipping: {} (not a usable file name)", item.name);
            }
            continue;
        };

        if output_path.exists() {
            match cli.on_existing() {
                ExistingFile::Overwrite => {}
                ExistingFile::Keep => {
                    if !cli.is_quiet() {
                        eprintln!("Skipping: {} (file exists)", item.name);
                    }
                    continue;
                }
                ExistingFile::KeepWithHint => {
                    if !cli.is_quiet() {
                        eprintln!("Skipping: {} (use -o to overwrite)", item.name);
                    }
                    continue;
                }
            }
        }

        if !cli.is_quiet() {
            println!("  extracting: {}", item.name);
        }
        extractor
            .extract_to_file(item.entry, &output_path)
            .await
            .with_context(|| format!("cannot extract {}", item.name))?;
    }

    Ok(())
}
