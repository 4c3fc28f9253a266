use crossbeam::channel::unbounded;
use itertools::Itertools;
use queryrt::common::{Error, Result};
use queryrt::config::RuntimeConfig;
use queryrt::runtime::{field_key, Accumulator, Runtime};
use queryrt::types::{Record, SourceResult, Table};
use std::path::PathBuf;
use std::time::Duration;

const RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a sample compiled query: fetch a portfolio and a set of quotes on two
/// concurrent branches, wait for both, and inner-join them on `symbol`.
fn main() -> Result<()> {
    pretty_env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RuntimeConfig::load(config_path.as_deref())?;
    let rt = Runtime::from_config(&config)?;
    rt.log(format!(
        "runtime started with {} workers",
        rt.pool().worker_count()
    ));

    let (tx, rx) = unbounded();
    let program = rt.clone();
    let accumulator = rt.create_join(2, move |args| {
        let joined = table(&program, &args, "portfolio").and_then(|portfolio| {
            let quotes = table(&program, &args, "quotes")?;
            program.join(
                true,
                field_key("symbol"),
                field_key("symbol"),
                &portfolio,
                &quotes,
            )
        });
        // the receiver only goes away if main already gave up waiting
        let _ = tx.send(joined);
    })?;

    rt.start(
        |(accumulator, user): (Accumulator, String)| {
            let portfolio = Table::from_iter([
                Record::new().with("user", user.as_str()).with("symbol", "ACME").with("shares", 10),
                Record::new().with("user", user.as_str()).with("symbol", "INIT").with("shares", 4),
                Record::new().with("user", user.as_str()).with("symbol", "ZZZZ").with("shares", 1),
            ]);
            accumulator.arrive(Record::new().with("portfolio", portfolio))?;
            Ok(())
        },
        (accumulator.clone(), "demo".to_string()),
    )?;
    rt.start(
        |accumulator: Accumulator| {
            let quotes = Record::new()
                .with("symbol", "ACME")
                .with("price", 12.25);
            let more = Record::new().with("symbol", "INIT").with("price", 3.5);
            accumulator.arrive(Record::new().with("quotes", vec![quotes, more]))?;
            Ok(())
        },
        accumulator,
    )?;

    let rows = rx
        .recv_timeout(RESULT_TIMEOUT)
        .map_err(|e| Error::InvalidData(format!("query produced no result: {e}")))??;
    print_rows(&rows);

    rt.pool().shutdown();
    Ok(())
}

/// Reads a branch result carried through the join barrier as a table.
fn table(rt: &Runtime, args: &Record, name: &str) -> Result<Table> {
    match args.get(name) {
        Some(field) => Ok(rt.normalize(SourceResult::try_from(field.clone())?)),
        None => Ok(Table::new()),
    }
}

fn print_rows(rows: &[Record]) {
    rows.iter()
        .for_each(|row| println!("  {}", row.iter().map(|(_, value)| value.to_string()).join(", ")));
}
