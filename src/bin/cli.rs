#![cfg(not(tarpaulin_include))]

use faultsheet::loader::load_file;
use faultsheet::records::{SensorCategory, normalize_rows};
use std::env;
use std::time::Instant;

/// Normalize a local file the way the upload route does and print the result
///
/// Usage: `faultsheet-cli <file> [category]`
///
/// Without a category the sanitized table is printed as JSON. With one, the
/// rows are resolved into that category's records instead.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let s = Instant::now();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <file> [THERMAL|ACOUSTIC|VIBRATION]", args[0]);
        return Ok(());
    }

    let category = match args.get(2) {
        Some(name) => match SensorCategory::parse(name) {
            Some(category) => Some(category),
            None => {
                eprintln!("Error: Unknown category {}", name);
                return Ok(());
            }
        },
        None => None,
    };

    let mut table = load_file(&args[1])?;
    let dropped = table.sanitize();
    eprintln!("{} data rows, {} blank rows dropped", table.data_len(), dropped);

    let output = match category {
        Some(category) => {
            let records = normalize_rows(category, &table.to_source_rows());
            serde_json::to_string_pretty(&records)?
        }
        None => serde_json::to_string_pretty(&table)?,
    };
    println!("{}", output);

    eprintln!("Total elapsed time: {:.1} seconds", s.elapsed().as_secs_f64());
    Ok(())
}
