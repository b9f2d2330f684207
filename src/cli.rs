use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use std::path::PathBuf;

use crate::config::SnapshotConfig;
use crate::directories::Directories;
use crate::manifest::{manifest_path, SnapshotManifest};
use crate::metrics::metrics_snapshot;
use crate::snapshot::{clear_expired, clear_snapshot, SnapshotDetails, SnapshotLoader, ITEM_NAMES};
use crate::util::now_millis;

#[derive(Parser, Debug)]
#[command(
    name = "tablesnap",
    version,
    about = "Inspect and maintain table snapshots",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List snapshots with their sizes
    List {
        /// Data root (repeatable); defaults to TSNAP_DATA_DIRS
        #[arg(long = "data-dir")]
        data_dirs: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
        /// Include ephemeral snapshots
        #[arg(long)]
        include_ephemeral: bool,
    },
    /// Remove snapshots by tag or all expired ones
    Clear {
        #[arg(long = "data-dir")]
        data_dirs: Vec<PathBuf>,
        #[arg(long, conflicts_with = "expired")]
        tag: Option<String>,
        #[arg(long)]
        expired: bool,
    },
    /// Print the manifest of one snapshot directory
    Inspect {
        #[arg(long)]
        dir: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let res = match cli.cmd {
        Cmd::List {
            data_dirs,
            json,
            include_ephemeral,
        } => cmd_list(config_with(data_dirs)?, json, include_ephemeral),
        Cmd::Clear {
            data_dirs,
            tag,
            expired,
        } => cmd_clear(config_with(data_dirs)?, tag, expired),
        Cmd::Inspect { dir } => cmd_inspect(dir),
    };
    debug!("{:?}", metrics_snapshot());
    res
}

fn config_with(data_dirs: Vec<PathBuf>) -> Result<SnapshotConfig> {
    let mut cfg = SnapshotConfig::from_env();
    if !data_dirs.is_empty() {
        cfg = cfg.with_data_dirs(data_dirs);
    }
    if cfg.data_dirs.is_empty() {
        return Err(anyhow!("no data directories: pass --data-dir or set TSNAP_DATA_DIRS"));
    }
    Ok(cfg)
}

fn cmd_list(cfg: SnapshotConfig, json: bool, include_ephemeral: bool) -> Result<()> {
    let loader = SnapshotLoader::new(cfg);
    let mut rows = Vec::new();
    for snap in loader.load_all() {
        if snap.is_ephemeral() && !include_ephemeral {
            continue;
        }
        let dirs = Directories::new(
            &loader.config().data_dirs,
            snap.keyspace_name(),
            snap.table_name(),
            snap.table_id(),
        );
        let live = dirs.live_files();
        rows.push(SnapshotDetails::from_snapshot(&snap, Some(&live)));
    }

    if json {
        let s = serde_json::to_string_pretty(&rows).context("serialize snapshot details")?;
        println!("{s}");
        return Ok(());
    }
    if rows.is_empty() {
        println!("There are no snapshots");
        return Ok(());
    }

    let mut total: u64 = 0;
    println!("{}", ITEM_NAMES.join(" | "));
    for r in &rows {
        println!("{}", r.columns().join(" | "));
        total += r.raw_true_size;
    }
    println!();
    println!(
        "Total TrueDiskSpaceUsed: {}",
        crate::util::stringify_file_size(total)
    );
    Ok(())
}

fn cmd_clear(cfg: SnapshotConfig, tag: Option<String>, expired: bool) -> Result<()> {
    let loader = SnapshotLoader::new(cfg);
    let snapshots = loader.load_all();

    if expired {
        let cleared = clear_expired(&snapshots, now_millis())?;
        println!("cleared {} expired snapshot(s)", cleared.len());
        for id in cleared {
            println!("  {id}");
        }
        return Ok(());
    }

    let tag = tag.ok_or_else(|| anyhow!("provide --tag or --expired"))?;
    let mut n = 0usize;
    for snap in snapshots.iter().filter(|s| s.tag() == tag) {
        clear_snapshot(snap)?;
        n += 1;
    }
    println!("cleared snapshot '{}' in {} table(s)", tag, n);
    Ok(())
}

fn cmd_inspect(dir: PathBuf) -> Result<()> {
    let path = manifest_path(&dir);
    let m = SnapshotManifest::read_from(&path)
        .with_context(|| format!("read manifest in {}", dir.display()))?;
    let s = serde_json::to_string_pretty(&m).context("serialize manifest")?;
    println!("{s}");
    Ok(())
}
