use anyhow::{Context, Result};
use nrmcapi::{NormalizedData, Session};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // RUST_LOG=nrmcapi=debug shows one line per request; NRMC_DEBUG=1 adds wire logs.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Configure NRMC_URL, NRMC_USERNAME, NRMC_PASSWORD (and usually NRMC_TIMEOUT_MS).
    let session = Session::from_env().context("could not open an NRMC session")?;

    let out = session.get("/api/portfolios")?;
    out.response
        .error_for_status()
        .context("listing portfolios failed")?;

    match &out.data {
        NormalizedData::Table(table) => {
            println!("{}", table.columns().join("\t"));
            for row in table.rows() {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", cells.join("\t"));
            }
        }
        NormalizedData::Empty => println!("no portfolios"),
        NormalizedData::Passthrough => {
            out.response.save_to(Path::new("portfolios.json"))?;
            println!("response saved to portfolios.json");
        }
    }
    Ok(())
}
