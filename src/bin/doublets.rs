//! Binary entry point for the doublets administrative CLI.
#![forbid(unsafe_code)]

#[path = "doublets/config.rs"]
mod config;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use doublets::{
    decorators::{replay, LoggedLinks},
    storage::{stats, verify, StatsReport, VerifyReport},
    FileMemory, Link, LinkAddress, Links, LinksExt, LinksOptions, LogOptions, MemoryLinks,
    TransitionLog,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::CliConfig;

type Store = MemoryLinks<u64, FileMemory>;

#[derive(Parser, Debug)]
#[command(
    name = "doublets",
    version,
    about = "Administrative CLI for file-backed doublet link stores",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "DOUBLETS_DB",
        help = "Store file (defaults to [database] default from the config)"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "DOUBLETS_CONFIG",
        help = "CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "BYTES",
        help = "Bytes added to the store file each time it runs out of slots"
    )]
    reservation_step: Option<u64>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Append every change to this transition log"
    )]
    log: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create a link, optionally setting its value")]
    Create {
        #[arg(value_name = "SOURCE", requires = "target")]
        source: Option<u64>,

        #[arg(value_name = "TARGET")]
        target: Option<u64>,
    },

    #[command(about = "Set the source and target of a link")]
    Update {
        #[arg(value_name = "ID")]
        id: u64,

        #[arg(value_name = "SOURCE")]
        source: u64,

        #[arg(value_name = "TARGET")]
        target: u64,
    },

    #[command(about = "Delete a link")]
    Delete {
        #[arg(value_name = "ID")]
        id: u64,
    },

    #[command(about = "Count links matching a restriction (`*` matches anything)")]
    Count {
        #[arg(value_name = "R", num_args = 0..=3, value_parser = parse_restriction)]
        restriction: Vec<Restriction>,
    },

    #[command(about = "List links matching a restriction (`*` matches anything)")]
    List {
        #[arg(value_name = "R", num_args = 0..=3, value_parser = parse_restriction)]
        restriction: Vec<Restriction>,
    },

    #[command(about = "Verify the store's index trees and free list")]
    Verify,

    #[command(about = "Print occupancy and layout statistics")]
    Stats,

    #[command(about = "Re-apply a transition log to the store")]
    Replay {
        #[arg(value_name = "LOG")]
        log: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Restriction {
    Any,
    Value(u64),
}

fn parse_restriction(raw: &str) -> Result<Restriction, String> {
    match raw.trim() {
        "*" => Ok(Restriction::Any),
        value => value
            .parse()
            .map(Restriction::Value)
            .map_err(|_| format!("'{value}' is neither a link address nor '*'")),
    }
}

#[derive(Debug, Serialize)]
struct LinkView {
    index: u64,
    source: u64,
    target: u64,
}

impl From<Link<u64>> for LinkView {
    fn from(link: Link<u64>) -> Self {
        Self {
            index: link.index,
            source: link.source,
            target: link.target,
        }
    }
}

#[derive(Debug, Serialize)]
struct CountView {
    count: u64,
}

#[derive(Debug, Serialize)]
struct DeleteView {
    index: u64,
    existed: bool,
}

#[derive(Debug, Serialize)]
struct ReplayView {
    applied: u64,
}

struct LogTarget {
    path: PathBuf,
    sync: bool,
}

struct Context {
    db_path: PathBuf,
    options: LinksOptions,
    log: Option<LogTarget>,
}

impl Context {
    fn resolve(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let config = CliConfig::load(cli.config.clone())?;
        let db_path = cli
            .db
            .clone()
            .or_else(|| config.default_db_path().cloned())
            .ok_or("no store path; pass --db or set [database] default in the CLI config")?;
        let mut options = config.store_options();
        if let Some(step) = cli.reservation_step {
            options = options.reservation_step(step);
        }
        let log = cli
            .log
            .clone()
            .or_else(|| config.log().path.clone())
            .map(|path| LogTarget {
                path,
                sync: config.log().sync,
            });
        Ok(Self {
            db_path,
            options,
            log,
        })
    }

    fn open(&self) -> doublets::Result<Store> {
        MemoryLinks::open_file(&self.db_path, self.options.clone())
    }

    fn open_log(path: &Path, sync: bool) -> doublets::Result<TransitionLog> {
        let options = LogOptions::new(<u64 as LinkAddress>::BYTES as u32).sync_on_append(sync);
        TransitionLog::open(path, options)
    }

    /// Runs `op` against the store, through the transition log when one is
    /// configured, then flushes.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut dyn Links<u64>) -> doublets::Result<R>,
    ) -> doublets::Result<R> {
        let mut store = self.open()?;
        let result = match &self.log {
            Some(target) => {
                let log = Self::open_log(&target.path, target.sync)?;
                let mut logged = LoggedLinks::new(store, log);
                let result = op(&mut logged)?;
                let (inner, log) = logged.into_parts();
                log.sync()?;
                store = inner;
                result
            }
            None => op(&mut store)?,
        };
        store.flush()?;
        Ok(result)
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DOUBLETS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let ctx = Context::resolve(&cli)?;

    match cli.command {
        Command::Create { source, target } => {
            let link = ctx.mutate(|links| {
                let index = links.create(&[])?;
                let index = match (source, target) {
                    (Some(source), Some(target)) => links.update_link(index, source, target)?,
                    _ => index,
                };
                Ok(links.get_link(index)?.unwrap_or_else(|| Link::nothing(index)))
            })?;
            let view = LinkView::from(link);
            emit(&cli.format, &view, |_| print_link_text(&view))?;
        }
        Command::Update { id, source, target } => {
            let link = ctx.mutate(|links| {
                let index = links.update_link(id, source, target)?;
                Ok(links.get_link(index)?.unwrap_or_else(|| Link::nothing(index)))
            })?;
            let view = LinkView::from(link);
            emit(&cli.format, &view, |_| print_link_text(&view))?;
        }
        Command::Delete { id } => {
            let existed = ctx.mutate(|links| {
                let existed = links.exists(id)?;
                links.delete_link(id)?;
                Ok(existed)
            })?;
            let view = DeleteView { index: id, existed };
            emit(&cli.format, &view, |_| {
                if view.existed {
                    println!("deleted {}", view.index);
                } else {
                    println!("link {} does not exist", view.index);
                }
            })?;
        }
        Command::Count { restriction } => {
            let store = ctx.open()?;
            let restriction = lower_restriction(&store, &restriction);
            let view = CountView {
                count: store.count(&restriction)?,
            };
            emit(&cli.format, &view, |_| println!("{}", view.count))?;
        }
        Command::List { restriction } => {
            let store = ctx.open()?;
            let restriction = lower_restriction(&store, &restriction);
            let views: Vec<LinkView> = store
                .all(&restriction)?
                .into_iter()
                .map(LinkView::from)
                .collect();
            emit(&cli.format, &views, |_| {
                for view in &views {
                    print_link_text(view);
                }
            })?;
        }
        Command::Verify => {
            let store = ctx.open()?;
            let report = verify(&store)?;
            emit(&cli.format, &report, |_| print_verify_text(&report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
        Command::Stats => {
            let store = ctx.open()?;
            let report = stats(&store);
            emit(&cli.format, &report, |_| print_stats_text(&report))?;
        }
        Command::Replay { log } => {
            let transitions = Context::open_log(&log, false)?;
            let mut store = ctx.open()?;
            let applied = replay(&transitions, &mut store)?;
            store.flush()?;
            let view = ReplayView { applied };
            emit(&cli.format, &view, |_| {
                println!("replayed {} transitions", view.applied)
            })?;
        }
    }

    Ok(())
}

fn lower_restriction(store: &Store, restriction: &[Restriction]) -> Vec<u64> {
    let any = store.constants().any;
    restriction
        .iter()
        .map(|part| match part {
            Restriction::Any => any,
            Restriction::Value(value) => *value,
        })
        .collect()
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_link_text(view: &LinkView) {
    println!("({}: {} {})", view.index, view.source, view.target);
}

fn print_stats_text(report: &StatsReport) {
    println!(
        "Links: total={} allocated={} reserved={} free={}",
        report.total_links, report.allocated_links, report.reserved_links, report.free_links
    );
    println!(
        "Layout: address_bytes={} link_size={} used_bytes={} reserved_bytes={}",
        report.address_bytes, report.link_size_bytes, report.used_bytes, report.reserved_bytes
    );
    println!(
        "Trees: source_depth={} target_depth={}",
        report.source_tree_depth, report.target_tree_depth
    );
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify => success={} allocated={} reserved={} free={} live={} source_nodes={} target_nodes={}",
        report.success,
        report.counts.allocated_links,
        report.counts.reserved_links,
        report.counts.free_links,
        report.counts.live_links,
        report.counts.source_tree_nodes,
        report.counts.target_tree_nodes,
    );
    for finding in &report.findings {
        println!("- {:?}: {}", finding.severity, finding.message);
    }
}
