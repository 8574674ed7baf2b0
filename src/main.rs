use std::ffi::OsString;
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use entsoe_prices::{
    EntsoeClient, Error, NorgesBankClient, PriceTable, Resolution, Settings, ZoneRegistry, ensure_parent_dir,
    plot_path, resolve_date, write_plot,
};

/// Download day-ahead prices from the ENTSO-E Transparency Platform.
#[derive(Parser, Debug)]
#[command(name = "entsoe-prices", version, about)]
#[command(
    long_about = "Download day-ahead prices from the ENTSO-E Transparency Platform.\n\
    \nThe security token is read from MY_ENTSOE_TOKEN (environment or .env).\n\
    \nExamples:\n  \
    entsoe-prices                                   # Norway, today until the last auction\n  \
    entsoe-prices -a nordics DE -s YEAR -e DAY -nok # NOK/kWh since Jan 1\n  \
    entsoe-prices -a NO1,NO2 -s 2024-12 -e 2025 -o ./out/prices.csv -r 60min"
)]
struct Cli {
    /// Bidding zones and/or keywords: all, nordics, norway, sweden, denmark, baltics, cwe
    #[arg(short = 'a', long = "bidding_zone", value_name = "ZONE", num_args = 1.., default_value = "norway")]
    bidding_zone: Vec<String>,

    /// Start date: YYYY, YYYY-MM, YYYY-MM-DD, or DAY/WEEK/MONTH/YEAR with an optional offset such as DAY-2D
    #[arg(short, long, value_name = "DATE", default_value = "DAY")]
    start: String,

    /// End date (exclusive), same forms as --start, or LAST_SDAC for the latest published auction
    #[arg(short, long, value_name = "DATE", default_value = "LAST_SDAC")]
    end: String,

    /// Fetch EUR->NOK rates from Norges Bank and report prices in NOK/kWh (also -nok)
    #[arg(long = "convert_to_nok")]
    convert_to_nok: bool,

    /// Save an interactive chart as an HTML file (next to --output, else day_ahead_prices.html); no browser is opened
    #[arg(short, long)]
    plot: bool,

    /// CSV output path, e.g. ./output/prices.csv
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output resolution: SDAC_MTU, 15min, 30min or 60min
    #[arg(short, long, default_value = "SDAC_MTU")]
    resolution: String,
}

/// `-nok` is not a valid clap short flag; map it to its long form.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut after_separator = false;
    args.into_iter()
        .map(|arg| {
            if arg == "--" {
                after_separator = true;
            }
            if !after_separator && arg == "-nok" {
                OsString::from("--convert_to_nok")
            } else {
                arg
            }
        })
        .collect()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let settings = Settings::from_env();
    let registry = ZoneRegistry::entsoe();

    // Everything below up to the client is local validation.
    let zones = registry.expand(cli.bidding_zone.as_slice())?;
    let today = Utc::now().with_timezone(&settings.timezone).date_naive();
    let start = resolve_date(&cli.start, today)?;
    let end = resolve_date(&cli.end, today)?;
    let resolution: Resolution = cli.resolution.parse()?;
    if let Some(path) = &cli.output {
        ensure_parent_dir(path)?;
    }

    let client = EntsoeClient::new(settings.clone(), registry)?;
    let range = client.resolve_range(start, end)?;
    info!(%start, %end, %range, "resolved dates");

    let mut prices = client.prices_for_range(&zones, &range, resolution)?;

    if cli.convert_to_nok {
        convert_to_nok(&settings, &mut prices);
    }

    if let Some(path) = &cli.output {
        prices.write_csv(path)?;
    }

    if cli.plot {
        write_plot(&prices, &plot_path(cli.output.as_deref()))?;
    }

    if cli.output.is_none() && !cli.plot {
        print_summary(&prices);
    }

    Ok(())
}

/// A failed lookup keeps the table in EUR/MWh.
fn convert_to_nok(settings: &Settings, prices: &mut PriceTable) {
    let Some((start, end)) = prices.local_dates() else {
        return;
    };
    info!("conversion to NOK/kWh requested, fetching rates from Norges Bank");

    let result = NorgesBankClient::new(settings)
        .and_then(|bank| bank.eur_to_nok(start, end))
        .and_then(|rates| prices.convert_to_nok(&rates));

    match result {
        Ok(()) => info!("currency conversion rates retrieved"),
        Err(error) => warn!(%error, "could not convert to NOK/kWh, continuing with EUR/MWh"),
    }
}

fn print_summary(prices: &PriceTable) {
    if let (Some((first, _)), Some((last, _))) = (prices.rows().next(), prices.rows().last()) {
        println!(
            "{} intervals from {} to {} ({})",
            prices.len(),
            prices.format_timestamp(first),
            prices.format_timestamp(last),
            prices.unit()
        );
    }
    println!("{:<6} {:>10} {:>10} {:>10}", "zone", "min", "mean", "max");
    for s in prices.summary() {
        println!("{:<6} {:>10.3} {:>10.3} {:>10.3}", s.zone, s.min, s.mean, s.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Oslo;
    use clap::CommandFactory;
    use entsoe_prices::{PriceSeries, PriceUnit};
    use mockito::Matcher;

    fn parse(args: &[&str]) -> Cli {
        let args = std::iter::once("entsoe-prices").chain(args.iter().copied()).map(OsString::from);
        Cli::try_parse_from(normalize_args(args)).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.bidding_zone, vec!["norway"]);
        assert_eq!(cli.start, "DAY");
        assert_eq!(cli.end, "LAST_SDAC");
        assert_eq!(cli.resolution, "SDAC_MTU");
        assert!(!cli.convert_to_nok);
        assert!(!cli.plot);
        assert!(cli.output.is_none());
    }

    #[test]
    fn short_nok_and_multiple_zones() {
        let cli = parse(&["-a", "NO1", "nordics", "-s", "YEAR-2Y", "-nok", "-p", "-o", "out.csv", "-r", "60min"]);
        assert_eq!(cli.bidding_zone, vec!["NO1", "nordics"]);
        assert_eq!(cli.start, "YEAR-2Y");
        assert!(cli.convert_to_nok);
        assert!(cli.plot);
        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.resolution, "60min");
    }

    #[test]
    fn long_flags() {
        let cli = parse(&["--bidding_zone", "cwe", "--end", "DAY+2D", "--convert_to_nok"]);
        assert_eq!(cli.bidding_zone, vec!["cwe"]);
        assert_eq!(cli.end, "DAY+2D");
        assert!(cli.convert_to_nok);
    }

    #[test]
    fn nok_is_only_rewritten_before_separator() {
        let args: Vec<OsString> = ["x", "-nok", "--", "-nok"].into_iter().map(OsString::from).collect();
        let out = normalize_args(args);
        assert_eq!(out[1], "--convert_to_nok");
        assert_eq!(out[3], "-nok");
    }

    #[test]
    fn validation_errors_exit_with_two() {
        let cli = parse(&["-a", "XX9"]);
        let err = run(cli).unwrap_err();
        assert!(matches!(err, Error::UnknownZoneToken(_)));
        assert_eq!(err.exit_code(), 2);

        let cli = parse(&["-s", "TOMORROW"]);
        assert_eq!(run(cli).unwrap_err().exit_code(), 2);

        let cli = parse(&["-r", "5min"]);
        assert!(matches!(run(cli).unwrap_err(), Error::InvalidResolution(_)));
    }

    #[test]
    fn plot_help_says_a_file_is_written() {
        let command = Cli::command();
        let plot = command.get_arguments().find(|a| a.get_id() == "plot").unwrap();
        let help = plot.get_help().unwrap().to_string();
        assert!(help.contains("HTML file"), "{help}");
    }

    fn eur_table() -> PriceTable {
        let mut series = PriceSeries::new(60);
        series.prices.insert(Utc.with_ymd_and_hms(2024, 12, 11, 23, 0, 0).unwrap(), 50.0);
        series.prices.insert(Utc.with_ymd_and_hms(2024, 12, 12, 0, 0, 0).unwrap(), 60.0);
        PriceTable::from_series(PriceUnit::EurPerMwh, Oslo, vec![("NO1".to_string(), series)])
    }

    fn rates_settings(server: &mockito::Server) -> Settings {
        Settings {
            norges_bank_url: format!("{}/rates", server.url()),
            ..Settings::default()
        }
    }

    #[test]
    fn failed_rate_lookup_keeps_eur() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rates")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();

        let mut prices = eur_table();
        convert_to_nok(&rates_settings(&server), &mut prices);

        mock.assert();
        assert_eq!(prices.unit(), PriceUnit::EurPerMwh);
        assert_eq!(prices, eur_table());
    }

    #[test]
    fn empty_rate_lookup_keeps_eur() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/rates")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"dataSets":[]}}"#)
            .create();

        let mut prices = eur_table();
        convert_to_nok(&rates_settings(&server), &mut prices);

        mock.assert();
        assert_eq!(prices.unit(), PriceUnit::EurPerMwh);
        assert_eq!(prices, eur_table());
    }
}
