use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, Layout};
use crate::daybook::{collect_allocations, locate_vouchers, CsvRow, Document, VoucherFields, XmlError};
use crate::text::{clean_xml_text, detect_decode_bytes, remove_leading_before_angle};

const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("XML parse error after cleaning: {0}")]
    Xml(#[from] XmlError),
    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// Checkpoints of a conversion run. Every method defaults to doing nothing.
pub trait Progress {
    fn reading(&mut self, _path: &Path) {}
    fn cleaned_xml_written(&mut self, _path: &Path) {}
    fn parsing(&mut self) {}
    fn vouchers_found(&mut self, _total: usize) {}
    /// Called every hundred vouchers and after the last one.
    fn vouchers_processed(&mut self, _done: usize, _total: usize) {}
    fn writing(&mut self, _path: &Path) {}
}

/// Silent [`Progress`].
pub struct NoProgress;

impl Progress for NoProgress {}

#[derive(Debug, Serialize)]
pub struct BasicRecord<'a> {
    pub voucher_id: &'a str,
    pub vch_type: &'a str,
    pub vch_key: &'a str,
    pub date: &'a str,
    pub gl_account: &'a str,
    pub amount: &'a str,
    pub narration: &'a str,
}

impl<'a> From<&'a CsvRow> for BasicRecord<'a> {
    fn from(row: &'a CsvRow) -> Self {
        BasicRecord {
            voucher_id: &row.voucher_id,
            vch_type: &row.vch_type,
            vch_key: &row.vch_key,
            date: &row.date,
            gl_account: &row.gl_account,
            amount: &row.amount,
            narration: &row.narration,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailedRecord<'a> {
    pub voucher_id: &'a str,
    pub vch_type: &'a str,
    pub vch_key: &'a str,
    pub date: &'a str,
    #[serde(rename = "vouchernumber")]
    pub voucher_number: &'a str,
    pub reference: &'a str,
    #[serde(rename = "partyname")]
    pub party_name: &'a str,
    pub gl_account: &'a str,
    #[serde(rename = "stockitemname")]
    pub stock_item_name: &'a str,
    pub rate: &'a str,
    #[serde(rename = "actualqty")]
    pub actual_qty: &'a str,
    #[serde(rename = "billedqty")]
    pub billed_qty: &'a str,
    pub amount: &'a str,
    pub narration: &'a str,
}

impl<'a> From<&'a CsvRow> for DetailedRecord<'a> {
    fn from(row: &'a CsvRow) -> Self {
        DetailedRecord {
            voucher_id: &row.voucher_id,
            vch_type: &row.vch_type,
            vch_key: &row.vch_key,
            date: &row.date,
            voucher_number: &row.voucher_number,
            reference: &row.reference,
            party_name: &row.party_name,
            gl_account: &row.gl_account,
            stock_item_name: &row.stock_item_name,
            rate: &row.rate,
            actual_qty: &row.actual_qty,
            billed_qty: &row.billed_qty,
            amount: &row.amount,
            narration: &row.narration,
        }
    }
}

/// Rows pulled out of one document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub vouchers: usize,
    /// Vouchers without allocations, each contributing one row.
    pub fallback_rows: usize,
    pub rows: Vec<CsvRow>,
}

/// Outcome of a completed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub vouchers: usize,
    pub rows: usize,
    pub fallback_rows: usize,
    /// Sum of every amount that parses as a decimal.
    pub net_amount: Decimal,
    /// Non-empty amounts that did not parse.
    pub unparsed_amounts: usize,
    pub output: PathBuf,
}

impl Summary {
    fn new(extraction: &Extraction, output: PathBuf) -> Summary {
        let mut summary = Summary {
            vouchers: extraction.vouchers,
            rows: extraction.rows.len(),
            fallback_rows: extraction.fallback_rows,
            output,
            ..Summary::default()
        };

        for row in extraction.rows.iter().filter(|r| !r.amount.is_empty()) {
            match Decimal::from_str(&row.amount) {
                Ok(amount) => summary.net_amount += amount,
                Err(err) => {
                    debug!("amount does not parse, voucher={}, amount={}, err={}", row.voucher_id, row.amount, err);
                    summary.unparsed_amounts += 1;
                },
            }
        }

        summary
    }
}

/// Decode raw export bytes and clean them into parseable XML text.
pub fn prepare_text(bytes: &[u8]) -> String {
    let decoded = detect_decode_bytes(bytes);
    clean_xml_text(remove_leading_before_angle(&decoded))
}

/// Parse cleaned XML text and flatten every voucher into rows.
pub fn extract_rows(xml: &str, progress: &mut dyn Progress) -> Result<Extraction, XmlError> {
    progress.parsing();
    let doc = Document::parse(xml)?;

    let vouchers = locate_vouchers(&doc);
    let total = vouchers.len();
    info!("found {} vouchers in {} elements", total, doc.len());
    progress.vouchers_found(total);

    let mut extraction = Extraction {
        vouchers: total,
        ..Extraction::default()
    };

    for (i, voucher) in vouchers.into_iter().enumerate() {
        let fields = VoucherFields::extract(voucher);
        let allocations = collect_allocations(voucher);
        debug!("voucher {}: id={}, allocations={}", i + 1, fields.id, allocations.len());

        if allocations.is_empty() {
            extraction.rows.push(fields.fallback_row(voucher));
            extraction.fallback_rows += 1;
        } else {
            extraction
                .rows
                .extend(allocations.iter().filter_map(|a| fields.allocation_row(a)));
        }

        let done = i + 1;
        if done % PROGRESS_INTERVAL == 0 || done == total {
            progress.vouchers_processed(done, total);
        }
    }

    Ok(extraction)
}

/// Write the header and one record per row.
pub fn write_rows<W: Write>(out: W, rows: &[CsvRow], layout: Layout) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    csv_writer.write_record(layout.header())?;

    for row in rows {
        match layout {
            Layout::Basic => csv_writer.serialize(BasicRecord::from(row))?,
            Layout::Detailed => csv_writer.serialize(DetailedRecord::from(row))?,
        }
    }

    csv_writer.flush()?;

    Ok(())
}

/// Create (or truncate) `path`, its directories included, and write the rows.
pub fn export_csv(rows: &[CsvRow], layout: Layout, path: &Path) -> Result<(), ConvertError> {
    let write_error = |source: io::Error| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let file = fs::File::create(path).map_err(write_error)?;
    write_rows(io::BufWriter::new(file), rows, layout)?;

    Ok(())
}

/// Run a whole conversion as described by `config`.
pub fn convert(config: &Config, progress: &mut dyn Progress) -> Result<Summary, ConvertError> {
    if !config.input.exists() {
        return Err(ConvertError::InputNotFound(config.input.clone()));
    }

    progress.reading(&config.input);
    let bytes = fs::read(&config.input).map_err(|source| ConvertError::Read {
        path: config.input.clone(),
        source,
    })?;
    let cleaned = prepare_text(&bytes);
    debug!("cleaned text: {} bytes from {} input bytes", cleaned.len(), bytes.len());

    if config.write_cleaned_xml {
        let cleaned_path = config.cleaned_xml_path();
        match fs::write(&cleaned_path, &cleaned) {
            Ok(()) => progress.cleaned_xml_written(&cleaned_path),
            Err(err) => warn!("could not write cleaned XML to {}: {}", cleaned_path.display(), err),
        }
    }

    let extraction = extract_rows(&cleaned, progress)?;

    let output = config.output_path();
    progress.writing(&output);
    export_csv(&extraction.rows, config.layout, &output)?;
    info!("wrote {} rows to {}", extraction.rows.len(), output.display());

    Ok(Summary::new(&extraction, output))
}
