//! Command-line maintenance tool for a header store.

use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgMatches, Command};

use dash_headers::logging::parse_level;
use dash_headers::storage::{find_linkage_break, FileBootstrap, NoBootstrap};
use dash_headers::{
    init_logging, ChainVerifier, Chain, FlatFileStore, HeaderBitsOracle, HeaderStorage, LogFileConfig,
    LoggingConfig, SyncConfig, ValidationError,
};

fn cli() -> Command {
    Command::new("dash-headers")
        .version(dash_headers::VERSION)
        .about("Inspect and repair a Dash block header store")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the header store")
                .default_value("./dash-headers-data")
                .global(true),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .help("Also write logs to DIR/run.log, archiving the previous run's log")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .global(true),
        )
        .subcommand(
            Command::new("info").about("Show the local height and tip hash").arg(
                Arg::new("bootstrap")
                    .long("bootstrap")
                    .value_name("FILE")
                    .help("Headers file to copy in when the store does not exist yet"),
            ),
        )
        .subcommand(
            Command::new("verify").about("Check that every stored header links to the one below it").arg(
                Arg::new("pow")
                    .long("pow")
                    .help("Also check each header's proof of work against its own bits")
                    .action(clap::ArgAction::SetTrue),
            ),
        )
        .subcommand(
            Command::new("truncate").about("Drop every header above a height").arg(
                Arg::new("height")
                    .long("height")
                    .value_name("HEIGHT")
                    .help("Last height to keep")
                    .required(true)
                    .value_parser(clap::value_parser!(u32)),
            ),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    if let Err(e) = run(&matches).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> dash_headers::Result<()> {
    let Some((command, sub)) = matches.subcommand() else {
        return Err(dash_headers::Error::Config("no subcommand given".to_string()));
    };

    // Global arguments are propagated down to the subcommand's matches.
    let level = sub.get_one::<String>("log-level").map_or("info", String::as_str);
    let _logging = init_logging(LoggingConfig {
        level: Some(parse_level(level)?),
        console: true,
        file: sub.get_one::<String>("log-dir").map(LogFileConfig::new),
    })?;

    let data_dir = sub.get_one::<String>("data-dir").map_or("./dash-headers-data", String::as_str);
    let config = SyncConfig::new(PathBuf::from(data_dir));
    config.validate().map_err(dash_headers::Error::Config)?;

    match command {
        "info" => {
            let store = match sub.get_one::<String>("bootstrap") {
                Some(source) => {
                    FlatFileStore::open_with_bootstrap(&config, &FileBootstrap::new(source)).await?
                }
                None => FlatFileStore::open_with_bootstrap(&config, &NoBootstrap).await?,
            };
            info(store)
        }
        "verify" => verify(FlatFileStore::open_with_config(&config)?, &config, sub.get_flag("pow")),
        "truncate" => {
            let height = sub.get_one::<u32>("height").copied();
            let mut store = FlatFileStore::open_with_config(&config)?;
            store.truncate_to(height)?;
            println!("Local height: {}", store.local_height_i64());
            Ok(())
        }
        other => Err(dash_headers::Error::Config(format!("unknown subcommand '{}'", other))),
    }
}

fn info(mut store: FlatFileStore) -> dash_headers::Result<()> {
    println!("Store:        {}", store.path().display());
    println!("Local height: {}", store.local_height_i64());

    if let Some(tip) = store.local_height() {
        if let Some(header) = store.read(tip)? {
            println!("Tip hash:     {}", header.block_hash());
            println!("Tip time:     {}", header.time);
        }
        println!("Chunks:       {}", tip / store.chunk_size() + 1);
    }
    Ok(())
}

fn verify(mut store: FlatFileStore, config: &SyncConfig, pow: bool) -> dash_headers::Result<()> {
    let Some(tip) = store.local_height() else {
        println!("Store is empty");
        return Ok(());
    };

    if let Some(height) = find_linkage_break(&mut store, 0..tip + 1)? {
        return Err(ValidationError::LinkageMismatch {
            height,
        }
        .into());
    }

    if pow {
        let last = tip.min(config.pow_checkpoint_height);
        let verifier = ChainVerifier::new(HeaderBitsOracle, config.pow_checkpoint_height);
        let mut start = 0;
        while start <= last {
            let end = last.min(start.saturating_add(config.chunk_size - 1));
            let chain = Chain::new(start, store.read_range(start..end + 1)?);
            let preceding = match start.checked_sub(1) {
                Some(below) => store.read(below)?.into_iter().collect(),
                None => Vec::new(),
            };

            verifier.verify(&preceding, &chain)?;
            tracing::debug!("Verified heights {}..={}", start, end);
            start = end + 1;
        }
    }

    println!("Verified {} headers", u64::from(tip) + 1);
    Ok(())
}
