use std::fs;
use std::path::Path;

use anyhow::Result;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use daybook_csv::config::{Config, Layout};
use daybook_csv::data::{self, ConvertError, NoProgress};

const SALES_DAYBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ENVELOPE>
 <BODY>
  <VOUCHER VCHTYPE="Sales" VCHKEY="k-1">
   <GUID>g-1</GUID>
   <DATE>15/01/2023</DATE>
   <NARRATION>Two items, same ledger</NARRATION>
   <ALLINVENTORYENTRIES.LIST>
    <INVENTORYITEM>
     <STOCKITEMNAME>Item A</STOCKITEMNAME>
     <ACCOUNTINGALLOCATIONS.LIST>
      <LEDGERNAME>Local Purchases 12%</LEDGERNAME>
      <AMOUNT>-22800</AMOUNT>
     </ACCOUNTINGALLOCATIONS.LIST>
    </INVENTORYITEM>
    <INVENTORYITEM>
     <STOCKITEMNAME>Item B</STOCKITEMNAME>
     <ACCOUNTINGALLOCATIONS.LIST>
      <LEDGERNAME>Local Purchases 12%</LEDGERNAME>
      <AMOUNT>-22800</AMOUNT>
     </ACCOUNTINGALLOCATIONS.LIST>
    </INVENTORYITEM>
   </ALLINVENTORYENTRIES.LIST>
  </VOUCHER>
 </BODY>
</ENVELOPE>
"#;

fn write_input(dir: &TempDir, name: &str, bytes: &[u8]) -> Result<Config> {
    let path = dir.path().join(name);
    fs::write(&path, bytes)?;
    Ok(Config::new(path))
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[test]
fn test_basic_layout_end_to_end() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = write_input(&dir, "daybook.xml", SALES_DAYBOOK.as_bytes())?;
    config.layout = Layout::Basic;

    let summary = data::convert(&config, &mut NoProgress)?;
    assert_eq!(summary.output, dir.path().join("daybook_extracted.csv"));
    assert_eq!(summary.vouchers, 1);
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.net_amount, dec!(-45600));

    let rows = read_csv(&summary.output)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], Layout::Basic.header().iter().map(|h| h.to_string()).collect::<Vec<_>>());
    for row in &rows[1..] {
        assert_eq!(
            row,
            &vec!["g-1", "Sales", "k-1", "2023-01-15", "Local Purchases 12%", "-22800", "Two items, same ledger"]
        );
    }

    Ok(())
}

#[test]
fn test_detailed_layout_end_to_end() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_input(&dir, "daybook.xml", SALES_DAYBOOK.as_bytes())?;

    let summary = data::convert(&config, &mut NoProgress)?;
    assert_eq!(summary.output, dir.path().join("daybook_extracted_with_items_and_ref.csv"));

    let rows = read_csv(&summary.output)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].len(), 14);
    assert_eq!(rows[0][8], "stockitemname");

    let items: Vec<_> = rows[1..].iter().map(|r| (r[7].as_str(), r[8].as_str(), r[12].as_str())).collect();
    assert_eq!(
        items,
        vec![
            ("Local Purchases 12%", "Item A", "-22800"),
            ("Local Purchases 12%", "Item B", "-22800"),
        ]
    );

    Ok(())
}

#[test]
fn test_cleaned_xml_is_written_and_round_trips() -> Result<()> {
    let dir = TempDir::new()?;
    let mut dirty = b"\xEF\xBB\xBF  garbage ".to_vec();
    dirty.extend_from_slice(&SALES_DAYBOOK.replace("Two items", "Two\x07 items&#27;").into_bytes());
    let config = write_input(&dir, "dirty.xml", &dirty)?;

    let first = data::convert(&config, &mut NoProgress)?;
    let cleaned_path = config.cleaned_xml_path();
    let cleaned = fs::read_to_string(&cleaned_path)?;
    assert!(cleaned.starts_with("<?xml"));
    assert!(!cleaned.contains('\u{7}'));

    let again = write_input(&dir, "again.xml", cleaned.as_bytes())?;
    let second = data::convert(&again, &mut NoProgress)?;
    assert_eq!(fs::read_to_string(again.cleaned_xml_path())?, cleaned);
    assert_eq!(read_csv(&second.output)?, read_csv(&first.output)?);

    Ok(())
}

#[test]
fn test_cleaned_xml_can_be_disabled() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = write_input(&dir, "daybook.xml", SALES_DAYBOOK.as_bytes())?;
    config.write_cleaned_xml = false;

    data::convert(&config, &mut NoProgress)?;
    assert!(!config.cleaned_xml_path().exists());

    Ok(())
}

#[test]
fn test_unwritable_cleaned_xml_does_not_stop_conversion() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_input(&dir, "daybook.xml", SALES_DAYBOOK.as_bytes())?;
    fs::create_dir(config.cleaned_xml_path())?;

    let summary = data::convert(&config, &mut NoProgress)?;
    assert_eq!(summary.rows, 2);
    assert!(config.cleaned_xml_path().is_dir());
    assert_eq!(read_csv(&summary.output)?.len(), 3);

    Ok(())
}

#[test]
fn test_utf16_input_matches_utf8_input() -> Result<()> {
    let dir = TempDir::new()?;
    let mut utf16 = vec![0xFF, 0xFE];
    for unit in SALES_DAYBOOK.encode_utf16() {
        utf16.extend_from_slice(&unit.to_le_bytes());
    }

    let wide = data::convert(&write_input(&dir, "wide.xml", &utf16)?, &mut NoProgress)?;
    let narrow = data::convert(&write_input(&dir, "narrow.xml", SALES_DAYBOOK.as_bytes())?, &mut NoProgress)?;
    assert_eq!(read_csv(&wide.output)?, read_csv(&narrow.output)?);

    Ok(())
}

#[test]
fn test_header_written_without_vouchers() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_input(&dir, "empty.xml", b"<ENVELOPE><BODY/></ENVELOPE>")?;

    let summary = data::convert(&config, &mut NoProgress)?;
    assert_eq!(summary.rows, 0);
    assert_eq!(read_csv(&summary.output)?.len(), 1);

    Ok(())
}

#[test]
fn test_existing_output_is_overwritten() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_input(&dir, "daybook.xml", SALES_DAYBOOK.as_bytes())?;
    fs::write(config.output_path(), "stale\nstale\nstale\nstale\nstale\n")?;

    data::convert(&config, &mut NoProgress)?;
    assert_eq!(read_csv(&config.output_path())?.len(), 3);

    Ok(())
}

#[test]
fn test_export_creates_parent_directories() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("out.csv");

    data::export_csv(&[], Layout::Basic, &path)?;
    assert_eq!(fs::read_to_string(&path)?, "voucher_id,vch_type,vch_key,date,gl_account,amount,narration\n");

    Ok(())
}

#[test]
fn test_missing_input_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config::new(dir.path().join("missing.xml"));

    let err = data::convert(&config, &mut NoProgress).unwrap_err();
    assert!(matches!(err, ConvertError::InputNotFound(_)));
    assert!(!config.output_path().exists());

    Ok(())
}

#[test]
fn test_malformed_xml_is_an_error_and_writes_no_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write_input(&dir, "broken.xml", b"<ENVELOPE><VOUCHER></ENVELOPE>")?;

    let err = data::convert(&config, &mut NoProgress).unwrap_err();
    assert!(matches!(err, ConvertError::Xml(_)));
    assert!(err.to_string().starts_with("XML parse error after cleaning"));
    assert!(!config.output_path().exists());

    Ok(())
}
