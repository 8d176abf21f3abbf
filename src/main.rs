use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use icp_pivot::export::write_csv;
use icp_pivot::pivot::engine::{pivot_records, PivotOptions};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (input, output) = match args.as_slice() {
        [input] => (PathBuf::from(input), None),
        [input, output] => (PathBuf::from(input), Some(PathBuf::from(output))),
        _ => bail!("usage: icp-pivot <export.csv|.json|.parquet> [wide.csv]"),
    };

    let run = icp_pivot::data::loader::load_file(&input)?;
    let table = pivot_records(&run.records, &PivotOptions::default())
        .context("pivoting records")?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_csv(&table, file, true)?;
            eprintln!(
                "{} readings → {} rows × {} columns → {}",
                run.len(),
                table.len(),
                table.columns.len(),
                path.display()
            );
        }
        None => write_csv(&table, std::io::stdout().lock(), true)?,
    }

    Ok(())
}
