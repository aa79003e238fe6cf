use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::Env;

use daybook_csv::config::{self, Args, USAGE};
use daybook_csv::data::{self, Progress};

const RULE_WIDTH: usize = 60;

struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn reading(&mut self, _path: &Path) {
        println!("Reading XML file...");
    }

    fn cleaned_xml_written(&mut self, path: &Path) {
        println!("Cleaned XML written to: {}", path.display());
    }

    fn parsing(&mut self) {
        println!("Parsing XML data...");
    }

    fn vouchers_found(&mut self, total: usize) {
        println!("Found {} vouchers. Processing...", total);
    }

    fn vouchers_processed(&mut self, done: usize, total: usize) {
        println!("Processed {}/{} vouchers...", done, total);
    }

    fn writing(&mut self, _path: &Path) {
        println!("Writing data to CSV...");
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        eprintln!("\nERROR: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", USAGE);
            return Err(err.into());
        },
    };
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    print_banner();

    let input = match args.input.clone() {
        Some(input) => input,
        None => prompt_for_input()?,
    };
    let config = args.into_config(input);

    let summary = data::convert(&config, &mut ConsoleProgress)?;

    println!("\nSuccess - wrote {} rows to: {}", summary.rows, summary.output.display());
    println!(
        "{} vouchers, {} without ledger lines, net amount {}",
        summary.vouchers, summary.fallback_rows, summary.net_amount
    );
    if summary.unparsed_amounts > 0 {
        println!("{} amounts could not be read as numbers", summary.unparsed_amounts);
    }

    Ok(())
}

fn print_banner() {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Tally Daybook - XML to CSV Converter");
    println!("{}", "=".repeat(RULE_WIDTH));
    println!();
}

fn prompt_for_input() -> Result<PathBuf> {
    print!("Enter the path to the XML file: ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer).context("could not read the input path")?;

    Ok(config::input_from_prompt(&answer)?)
}
