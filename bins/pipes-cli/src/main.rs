//! # pipes-cli - demo runner for the `pipes` streaming pipeline
//!
//! Assembles one of two small fixed graphs over the in-memory
//! [`pipes_io::MemDatasetStore`] reference dataset store and runs it to
//! completion:
//!
//! - `pad`: a zero-source through a [`pipes_tx::Pad`] into a file-output,
//!   the shape of spec.md §8 scenario 2.
//! - `copy`: a file-input through one [`pipes_tx::Passthru`] per chunk
//!   into a file-output, the shape of spec.md §8 scenario 3.
//!
//! Both demos are synchronous: `arena.init` / `arena.execute` recurse
//! directly through the tool graph, with no channels or tasks involved -
//! the pull core is single-threaded by design (spec.md §5).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipes_core::{Arena, OpenMode, SourceHandle, Tool};
use pipes_io::{FileInputTool, FileOutputTool, MemDatasetStore};
use pipes_tx::{Pad, Passthru, ZeroSource};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pipes-cli")]
#[command(about = "Demo runner for the pipes multidimensional streaming pipeline")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// zero-source -> pad -> file-output
    Pad {
        /// Where to write the resulting dataset (a `MemDatasetStore` JSON file).
        #[arg(long, default_value = "/tmp/pipes-demo-pad.json")]
        out: PathBuf,
        /// Dimension string for the zero-source, fastest-varying first.
        #[arg(long, default_value = "xyz")]
        dims: String,
        /// Colon-separated extents matching `dims`.
        #[arg(long, default_value = "4:4:4")]
        extents: String,
        /// Which dimension character to pad.
        #[arg(long, default_value_t = 'z')]
        pad_dim: char,
        /// Output extent of the padded dimension.
        #[arg(long, default_value_t = 6)]
        pad_extent: i64,
        /// Leading shift before upstream data begins.
        #[arg(long, default_value_t = 1)]
        pad_shift: i64,
        /// Value written into the fill regions.
        #[arg(long, default_value_t = 7.0)]
        fill_value: f64,
    },
    /// file-input -> passthru (one per chunk) -> file-output
    Copy {
        /// Existing `MemDatasetStore` JSON file to read.
        #[arg(long)]
        input: PathBuf,
        /// Where to write the copied dataset.
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Pad {
            out,
            dims,
            extents,
            pad_dim,
            pad_extent,
            pad_shift,
            fill_value,
        } => run_pad_demo(out, &dims, &extents, pad_dim, pad_extent, pad_shift, fill_value),
        Command::Copy { input, output } => run_copy_demo(input, output),
    }
}

fn run_pad_demo(
    out: PathBuf,
    dims: &str,
    extents: &str,
    pad_dim: char,
    pad_extent: i64,
    pad_shift: i64,
    fill_value: f64,
) -> Result<()> {
    let mut arena = Arena::new();

    let zero = ZeroSource::new(dims, extents)
        .context("dims/extents mismatch or unparsable extent for zero-source")?;
    let zero_id = arena.insert(Box::new(zero));

    let pad_id = arena.insert(Box::new(Pad::new(pad_dim, pad_extent, pad_shift, fill_value)));
    arena.connect(
        pad_id,
        0,
        SourceHandle {
            tool: zero_id,
            index: 0,
        },
    )?;

    let store = MemDatasetStore::open(&out, OpenMode::Write)
        .with_context(|| format!("unable to open {} for writing", out.display()))?;
    let writer_id = arena.insert(Box::new(FileOutputTool::new(Box::new(store))));
    arena.connect(
        writer_id,
        0,
        SourceHandle {
            tool: pad_id,
            index: 0,
        },
    )?;

    arena.init(writer_id)?;
    arena.execute(writer_id)?;

    println!("wrote padded dataset to {}", out.display());
    Ok(())
}

fn run_copy_demo(input: PathBuf, output: PathBuf) -> Result<()> {
    let mut arena = Arena::new();

    let store_in = MemDatasetStore::open(&input, OpenMode::Read)
        .with_context(|| format!("unable to open {} for reading", input.display()))?;
    let file_in = FileInputTool::new(Box::new(store_in));
    let n_sources = file_in.sources().len();
    let reader_id = arena.insert(Box::new(file_in));
    arena.init(reader_id)?;

    let store_out = MemDatasetStore::open(&output, OpenMode::Write)
        .with_context(|| format!("unable to open {} for writing", output.display()))?;
    let writer_id = arena.insert(Box::new(FileOutputTool::new(Box::new(store_out))));

    for index in 0..n_sources {
        let pt_id = arena.insert(Box::new(Passthru::new()));
        arena.connect(pt_id, 0, SourceHandle { tool: reader_id, index })?;
        arena.connect(writer_id, index, SourceHandle { tool: pt_id, index: 0 })?;
    }

    arena.init(writer_id)?;
    arena.execute(writer_id)?;

    println!("copied {} to {}", input.display(), output.display());
    Ok(())
}
