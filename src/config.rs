use std::path::{Path, PathBuf};

use thiserror::Error;

pub const USAGE: &str = "Usage: daybook-csv [--basic] [--no-cleaned-xml] [input_file]

Converts a Tally daybook XML export into CSV, one row per ledger allocation.
Prompts for the input file when none is given.

Options:
  --basic            write only voucher, ledger and amount columns
  --no-cleaned-xml   do not write the <name>_cleaned.xml copy
  -h, --help         print this help";

const FALLBACK_STEM: &str = "daybook";

#[derive(Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("expected at most one input file, got {0:?} and {1:?}")]
    TooManyInputs(String, String),
    #[error("no input file given")]
    EmptyInput,
}

/// Column set of the generated CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Voucher identity, ledger and amount.
    Basic,
    /// Adds voucher number, reference, party and inventory columns.
    #[default]
    Detailed,
}

impl Layout {
    pub fn header(self) -> &'static [&'static str] {
        match self {
            Layout::Basic => &["voucher_id", "vch_type", "vch_key", "date", "gl_account", "amount", "narration"],
            Layout::Detailed => &[
                "voucher_id",
                "vch_type",
                "vch_key",
                "date",
                "vouchernumber",
                "reference",
                "partyname",
                "gl_account",
                "stockitemname",
                "rate",
                "actualqty",
                "billedqty",
                "amount",
                "narration",
            ],
        }
    }

    fn output_suffix(self) -> &'static str {
        match self {
            Layout::Basic => "_extracted.csv",
            Layout::Detailed => "_extracted_with_items_and_ref.csv",
        }
    }
}

/// Everything one conversion run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input: PathBuf,
    pub layout: Layout,
    pub write_cleaned_xml: bool,
}

impl Config {
    pub fn new(input: impl Into<PathBuf>) -> Config {
        Config {
            input: input.into(),
            layout: Layout::default(),
            write_cleaned_xml: true,
        }
    }

    /// CSV next to the input, named after it.
    pub fn output_path(&self) -> PathBuf {
        self.sibling(self.layout.output_suffix())
    }

    pub fn cleaned_xml_path(&self) -> PathBuf {
        self.sibling("_cleaned.xml")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_STEM.to_string());
        let name = format!("{stem}{suffix}");

        match self.input.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Command line as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub input: Option<PathBuf>,
    pub layout: Layout,
    pub write_cleaned_xml: bool,
    pub help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            input: None,
            layout: Layout::default(),
            write_cleaned_xml: true,
            help: false,
        }
    }
}

impl Args {
    /// Parse arguments, program name excluded.
    pub fn parse<I>(args: I) -> Result<Args, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();

        for arg in args {
            match arg.as_str() {
                "--basic" => parsed.layout = Layout::Basic,
                "--no-cleaned-xml" => parsed.write_cleaned_xml = false,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(ConfigError::UnknownOption(arg));
                },
                _ => {
                    if let Some(previous) = &parsed.input {
                        return Err(ConfigError::TooManyInputs(previous.display().to_string(), arg));
                    }
                    parsed.input = Some(PathBuf::from(arg));
                },
            }
        }

        Ok(parsed)
    }

    pub fn into_config(self, input: PathBuf) -> Config {
        Config {
            input,
            layout: self.layout,
            write_cleaned_xml: self.write_cleaned_xml,
        }
    }
}

/// Turn a typed or pasted path into a usable one. Surrounding whitespace and
/// one pair of matching quotes (left by drag-and-drop) are removed.
pub fn input_from_prompt(answer: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = answer.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| trimmed.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)))
        .unwrap_or(trimmed)
        .trim();

    if unquoted.is_empty() {
        return Err(ConfigError::EmptyInput);
    }

    Ok(Path::new(unquoted).to_path_buf())
}
