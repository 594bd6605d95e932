use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use scanchanges::cli::{Cli, Command, FollowArgs, LeadArgs, OutputArgs, ScanArgs};
use scanchanges::config::{self, Overrides, ScanConfig};
use scanchanges::config_file::ConfigFile;
use scanchanges::gitlog::{LogParser, LogSource};
use scanchanges::logging::{self, LogConfig};
use scanchanges::output::{CsvSink, OutputSink, SinkChain, SummarySink};
use scanchanges::parallel::{join_workers, scan_local, spawn_workers, Coordinator};
use scanchanges::platform::{self, ExitCode};
use scanchanges::remote::{LeaderServer, RemoteWorkerChannels};
use scanchanges::{CommitRecord, Matcher};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here, on stdout
            let code = if e.use_stderr() {
                ExitCode::Usage
            } else {
                ExitCode::Success
            };
            let _ = e.print();
            code.exit();
        }
    };

    logging::init(LogConfig::new(cli.verbose, cli.quiet));

    if cli.show_config {
        ConfigFile::show_config();
        ExitCode::Success.exit();
    }

    match run(cli) {
        Ok(()) => ExitCode::Success.exit(),
        Err(e) if platform::is_broken_pipe(&e) => ExitCode::Success.exit(),
        Err(e) => {
            eprintln!("scanchanges: Error: {:#}", e);
            ExitCode::for_error(&e).exit();
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let file = if cli.ignore_config {
        ConfigFile::default()
    } else {
        ConfigFile::load_with_custom_path(cli.config_file.as_deref())?
    };

    match cli.command {
        Some(Command::Scan(args)) => run_scan(&args, &file),
        Some(Command::Lead(args)) => run_lead(&args, &file),
        Some(Command::Follow(args)) => run_follow(&args, &file),
        None => Err(config::ConfigError(
            "no mode given, expected one of scan, lead, follow (see --help)".to_string(),
        )
        .into()),
    }
}

fn run_scan(args: &ScanArgs, file: &ConfigFile) -> Result<()> {
    let overrides = Overrides {
        threads: args.threads,
        date_field: args.output.date_field,
        ..Default::default()
    }
    .with_matching(&args.matching);
    let config = ScanConfig::resolve(&overrides, file)?;
    let matcher = build_matcher(&config)?;

    let records = load_history(&config::log_source(&args.source))?;
    let outcome = scan_local(&records, matcher, &config.parallel()).context("Scan failed")?;

    write_results(&args.output, &config, &records, &outcome.matched)
}

fn run_lead(args: &LeadArgs, file: &ConfigFile) -> Result<()> {
    let overrides = Overrides {
        date_field: args.output.date_field,
        ..Default::default()
    }
    .with_matching(&args.matching)
    .with_remote(&args.remote);
    let config = ScanConfig::resolve(&overrides, file)?;
    let secret = config.secret_bytes()?;
    let matcher = build_matcher(&config)?;

    let records = load_history(&config::log_source(&args.source))?;

    let coordinator = Coordinator::default();
    let server = LeaderServer::start(config.address(), secret, coordinator.distributor())
        .with_context(|| format!("Failed to listen on {}:{}", config.host, config.port))?;
    log::info!(
        "leading {} commits on {}, waiting for followers",
        records.len(),
        server.local_addr()
    );

    let local = spawn_workers(args.local_workers, &matcher, |_| {
        Ok(coordinator.distributor().worker_channels())
    })?;

    let outcome = coordinator.run(&records).context("Scan failed")?;
    server.shutdown();
    join_workers(local).context("Local worker failed")?;
    log::info!(
        "{} workers took part, {} protocol violations",
        outcome.workers,
        outcome.protocol_violations
    );

    write_results(&args.output, &config, &records, &outcome.matched)
}

fn run_follow(args: &FollowArgs, file: &ConfigFile) -> Result<()> {
    let overrides = Overrides {
        threads: args.threads,
        ..Default::default()
    }
    .with_matching(&args.matching)
    .with_remote(&args.remote);
    let config = ScanConfig::resolve(&overrides, file)?;
    let secret = config.secret_bytes()?;
    let matcher = build_matcher(&config)?;

    let handles = spawn_workers(config.threads, &matcher, |_| {
        RemoteWorkerChannels::connect(config.address(), &secret)
    })
    .with_context(|| format!("Failed to join leader {}:{}", config.host, config.port))?;

    let total = join_workers(handles).context("Follower failed")?;
    log::info!(
        "processed {} commits, {} matched",
        total.processed,
        total.matched
    );
    Ok(())
}

fn build_matcher(config: &ScanConfig) -> Result<Arc<dyn Matcher>> {
    let matcher = config.matcher()?;
    log::debug!("matching commit messages against {}", matcher.pattern());
    Ok(Arc::new(matcher))
}

/// Read and parse the whole history before any work is handed out
fn load_history(source: &LogSource) -> Result<Vec<Arc<CommitRecord>>> {
    let text = source
        .read()
        .with_context(|| format!("Failed to read {}", source.describe()))?;

    let parser = LogParser::new();
    let records = parser
        .entries(&text)
        .enumerate()
        .map(|(index, entry)| {
            entry
                .map(Arc::new)
                .with_context(|| format!("Failed to parse log entry #{}", index))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Invalid history in {}", source.describe()))?;

    log::info!(
        "parsed {} commits from {} ({} distinct time zones)",
        records.len(),
        source.describe(),
        parser.timezones().len()
    );
    Ok(records)
}

fn write_results(
    args: &OutputArgs,
    config: &ScanConfig,
    all: &[Arc<CommitRecord>],
    matched: &[Arc<CommitRecord>],
) -> Result<()> {
    let out = platform::open_output(args.output.as_deref())?;

    let mut sinks = SinkChain::new();
    sinks.push(CsvSink::new(out, config.date_field));
    if args.summary {
        sinks.push(SummarySink::new(std::io::stderr()));
    }
    sinks.emit(all, matched)
}
