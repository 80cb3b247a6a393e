use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{ArgGroup, Parser, ValueEnum};

use crate::error::{ArchiveError, ErrorKind};
use crate::gzip::{AddOptions, Entry, FieldText, PartialRead, TextEncoding};

#[derive(Parser, Debug)]
#[command(name = "arcgz")]
#[command(version)]
#[command(about = "A metadata-aware gzip archiver", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["list", "create", "append", "extract"])
))]
#[command(after_help = "Examples:\n  \
  arcgz -l archive.gz                   show every member and its header fields\n  \
  arcgz -c archive.gz a.txt b.txt       create an archive from two files\n  \
  arcgz -a archive.gz --content hi      append a member holding the string \"hi\"\n  \
  arcgz -d archive.gz a.txt             extract the latest a.txt")]
pub struct Cli {
    /// Show the list of members
    #[arg(short = 'l', value_name = "ARCHIVE")]
    pub list: Option<PathBuf>,

    /// Create a new archive from target files
    #[arg(short = 'c', value_name = "ARCHIVE")]
    pub create: Option<PathBuf>,

    /// Add target files to the end of the archive
    #[arg(short = 'a', value_name = "ARCHIVE")]
    pub append: Option<PathBuf>,

    /// Extract files from the archive (default: all named members)
    #[arg(short = 'd', value_name = "ARCHIVE")]
    pub extract: Option<PathBuf>,

    /// Target files
    #[arg(value_name = "TARGETS")]
    pub targets: Vec<String>,

    /// Set the ASCII text flag
    #[arg(long)]
    pub ascii: bool,

    /// Add a CRC16 checksum to each header
    #[arg(long)]
    pub crc16: bool,

    /// File comment for each added member
    #[arg(long, value_name = "S")]
    pub comment: Option<String>,

    /// Write this string to the archive instead of target files
    #[arg(long, value_name = "S")]
    pub content: Option<String>,

    /// Encoding of --content (names are always stored as latin-1)
    #[arg(long, value_enum, default_value_t = Encoding::Utf8)]
    pub encoding: Encoding,

    /// Base64-encoded data for the extra field
    #[arg(long, value_name = "B64")]
    pub exfield: Option<String>,

    /// Compression level (1 = fastest, 9 = best)
    #[arg(long, value_name = "N", default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=9))]
    pub level: u32,

    /// Extract files to stdout (pipe mode)
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Overwrite existing files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    #[value(name = "utf-8", alias = "utf8")]
    Utf8,
    #[value(name = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl From<Encoding> for TextEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => TextEncoding::Utf8,
            Encoding::Latin1 => TextEncoding::Latin1,
        }
    }
}

/// The action selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<'a> {
    List(&'a Path),
    Create(&'a Path),
    Append(&'a Path),
    Extract(&'a Path),
}

impl Cli {
    pub fn mode(&self) -> Option<Mode<'_>> {
        if let Some(ref path) = self.list {
            Some(Mode::List(path))
        } else if let Some(ref path) = self.create {
            Some(Mode::Create(path))
        } else if let Some(ref path) = self.append {
            Some(Mode::Append(path))
        } else {
            self.extract.as_deref().map(Mode::Extract)
        }
    }

    pub fn text_encoding(&self) -> TextEncoding {
        self.encoding.into()
    }

    /// `--content` encoded with `--encoding`
    pub fn content_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.content
            .as_deref()
            .map(|text| {
                self.text_encoding()
                    .encode(text)
                    .context("--content cannot be encoded")
            })
            .transpose()
    }

    pub fn exfield_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.exfield
            .as_deref()
            .map(|b64| STANDARD.decode(b64).context("--exfield is not valid base64"))
            .transpose()
    }

    /// Per-member options shared by every target
    pub fn add_options(&self) -> Result<AddOptions> {
        Ok(AddOptions {
            level: self.level,
            comment: self.comment.clone(),
            extra: self.exfield_bytes()?,
            header_crc: self.crc16,
            text: self.ascii,
            ..AddOptions::default()
        })
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// What to do when an extracted file already exists. `-n` wins over `-o`.
    pub fn on_existing(&self) -> ExistingFile {
        if self.never_overwrite {
            ExistingFile::Keep
        } else if self.overwrite {
            ExistingFile::Overwrite
        } else {
            ExistingFile::KeepWithHint
        }
    }
}

/// Handling of a file that is already present at the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingFile {
    Overwrite,
    /// Skip quietly (`-n`)
    Keep,
    /// Skip and suggest `-o`
    KeepWithHint,
}

/// Why a target is not added to an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRegularFile,
    IsArchive,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotRegularFile => f.write_str("not a regular file"),
            SkipReason::IsArchive => f.write_str("the archive itself"),
        }
    }
}

/// Decide whether `target` can be added to the archive at `archive`.
pub fn check_target(target: &Path, archive: &Path) -> Option<SkipReason> {
    if !target.is_file() {
        return Some(SkipReason::NotRegularFile);
    }
    match (fs::canonicalize(target), fs::canonicalize(archive)) {
        (Ok(a), Ok(b)) if a == b => Some(SkipReason::IsArchive),
        _ => None,
    }
}

/// Members read from an archive, minus any trailing bytes that were dropped.
#[derive(Debug)]
pub struct Listing {
    pub entries: Vec<Entry>,
    /// The trailing-garbage failure that ended the read, if any
    pub ignored: Option<ArchiveError>,
}

/// Accept a read that only failed on trailing garbage, as gzip(1) does.
/// Any other failure is handed back untouched.
pub fn tolerate_trailing(
    read: std::result::Result<Vec<Entry>, PartialRead>,
) -> std::result::Result<Listing, PartialRead> {
    match read {
        Ok(entries) => Ok(Listing {
            entries,
            ignored: None,
        }),
        Err(mut partial) => {
            let only_trailing = partial.errors.len() == 1
                && partial.errors[0].kind() == ErrorKind::TrailingGarbage;
            if !only_trailing {
                return Err(partial);
            }
            Ok(Listing {
                ignored: partial.errors.pop(),
                entries: partial.entries,
            })
        }
    }
}

/// A member chosen for extraction.
#[derive(Debug)]
pub struct Extraction<'a> {
    /// Stored name, decoded as latin-1
    pub name: String,
    pub entry: &'a Entry,
    /// Basename of the stored name, `None` if it has none (e.g. `..`)
    pub output: Option<PathBuf>,
}

/// Pick the members to extract.
///
/// Without targets every distinct stored name is taken, in first-seen order.
/// Each name resolves to the last member carrying it. A target missing from
/// the archive fails the whole plan before anything is written.
pub fn plan_extraction<'a>(
    entries: &'a [Entry],
    targets: &[String],
) -> Result<Vec<Extraction<'a>>> {
    let names: Vec<FieldText> = if targets.is_empty() {
        let mut names: Vec<FieldText> = Vec::new();
        for filename in entries.iter().filter_map(|e| e.header().filename.as_ref()) {
            if !names.contains(filename) {
                names.push(filename.clone());
            }
        }
        names
    } else {
        targets
            .iter()
            .map(|t| {
                FieldText::from_latin1(t)
                    .with_context(|| format!("{}: no such file in the archive", t))
            })
            .collect::<Result<_>>()?
    };

    let mut plan = Vec::with_capacity(names.len());
    for name in &names {
        let display = name.to_latin1_string();
        let Some(entry) = entries.iter().rev().find(|e| e.has_name(name.as_bytes())) else {
            bail!("{}: no such file in the archive", display);
        };

        let output = Path::new(&display).file_name().map(PathBuf::from);
        plan.push(Extraction {
            name: display,
            entry,
            output,
        });
    }

    Ok(plan)
}

/// The `-l` block for one member. Absent fields show as `None`.
pub fn format_entry(entry: &Entry) -> String {
    let header = entry.header();
    let none = || "None".to_string();

    let mut out = String::new();
    let _ = writeln!(out, "---");
    let _ = writeln!(out, "method:   {}", header.method.as_u8());
    let _ = writeln!(out, "flg:      {}", header.flags.bits());
    let _ = writeln!(out, "mtime:    {}", header.mtime);
    let _ = writeln!(
        out,
        "xfl:      {}",
        header.extra_flags.map_or_else(none, |x| x.to_string())
    );
    let _ = writeln!(
        out,
        "os:       {}",
        header
            .os
            .map_or_else(none, |os| format!("{} ({})", os.as_u8(), os))
    );
    let _ = writeln!(
        out,
        "exfield:  {}",
        header
            .extra
            .as_ref()
            .map_or_else(none, |e| STANDARD.encode(e.as_bytes()))
    );
    let _ = writeln!(
        out,
        "filename: {}",
        header.filename.as_ref().map_or_else(none, |f| f.to_string())
    );
    let _ = writeln!(
        out,
        "comments: {}",
        header.comment.as_ref().map_or_else(none, |c| c.to_string())
    );
    let _ = writeln!(
        out,
        "crc16:    {}",
        header.header_crc.map_or_else(none, |c| c.to_string())
    );
    let _ = writeln!(out, "crc32:    {}", entry.member.trailer.crc32);
    let _ = writeln!(out, "isize:    {}", entry.member.trailer.isize);
    let _ = writeln!(out, "---");
    out
}
