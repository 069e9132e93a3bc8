use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stgene::gbin::{GeneReaderBuilder, DEFAULT_COMPRESSION_LEVEL, DEFAULT_TRAVERSAL_LIMIT_WORDS};
use stgene::synthetic::{synthetic, RNG_SEED};
use stgene::{json, BinaryCodec, Everything, FeatureCodec, Format, Gene, JsonCodec, ReadError};

/// Convert, inspect and benchmark spatial transcriptomics hit files
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Worker threads for compression and decoding (0 uses all cores)
    #[arg(short = 'T', long, global = true, default_value_t = 1)]
    threads: usize,

    /// zstd compression level for the compressed binary format
    #[arg(long, global = true, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    level: i32,

    /// Largest accepted binary message, in 8-byte words
    #[arg(long, global = true, default_value_t = DEFAULT_TRAVERSAL_LIMIT_WORDS)]
    traversal_limit: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a dataset between formats
    Convert {
        /// Input format (binary, binary-zstd, json)
        in_format: Format,
        input: PathBuf,
        /// Output format (binary, binary-zstd, json)
        out_format: Format,
        output: PathBuf,
    },

    /// Print selected genes line by line, one JSON object per line
    Genes {
        format: Format,
        input: PathBuf,
        /// Gene ids to retrieve
        #[arg(required = true)]
        ids: Vec<usize>,
    },

    /// Measure encode and decode times and output sizes of every format
    Bench {
        /// JSON export to benchmark with
        #[arg(required_unless_present = "synthetic")]
        input: Option<PathBuf>,

        /// Generate a random dataset with this many genes instead
        #[arg(long, conflicts_with = "input")]
        synthetic: Option<usize>,

        /// Number of spots of the generated dataset
        #[arg(long, default_value_t = 2000)]
        spots: usize,

        /// Seed of the generated dataset
        #[arg(long, default_value_t = RNG_SEED)]
        seed: u64,
    },
}

impl Cli {
    fn codec(&self, format: Format) -> Box<dyn FeatureCodec + Send + Sync> {
        match format {
            Format::Binary | Format::CompressedBinary => Box::new(BinaryCodec {
                compress: format == Format::CompressedBinary,
                level: self.level,
                threads: self.threads,
                traversal_limit: self.traversal_limit,
            }),
            Format::Json => Box::new(JsonCodec::default()),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn convert(cli: &Cli, in_format: Format, input: &Path, out_format: Format, output: &Path) -> Result<()> {
    let start = Instant::now();
    let everything = cli
        .codec(in_format)
        .read_path(input)
        .with_context(|| format!("unable to read {} as {in_format}", input.display()))?;
    info!(
        genes = everything.num_genes(),
        spots = everything.num_spots(),
        hits = everything.num_hits(),
        elapsed = ?start.elapsed(),
        "parsed input"
    );

    let start = Instant::now();
    cli.codec(out_format)
        .write_path(output, &everything)
        .with_context(|| format!("unable to write {} as {out_format}", output.display()))?;
    info!(elapsed = ?start.elapsed(), output = %output.display(), "serialized output");
    Ok(())
}

/// One line of a retrieved gene
#[derive(Serialize)]
struct LineRecord<'a> {
    id: usize,
    gene: &'a str,
    y: u32,
    x: Vec<u32>,
    hits: Vec<u64>,
}

fn genes(cli: &Cli, format: Format, input: &Path, ids: &[usize]) -> Result<()> {
    let (names, genes): (Vec<String>, Vec<Gene>) = match format {
        Format::Json => {
            let everything = json::parse_path(input)?;
            let genes = ids
                .iter()
                .map(|&id| select_gene(&everything, id))
                .collect::<stgene::Result<Vec<_>>>()?;
            (everything.gene_names().to_vec(), genes)
        }
        Format::Binary | Format::CompressedBinary => {
            let file = GeneReaderBuilder::default()
                .traversal_limit(cli.traversal_limit)
                .open(input)?;
            let reader = file.reader()?;
            (reader.gene_names()?, reader.retrieve_genes(ids)?)
        }
    };

    let mut out = BufWriter::new(std::io::stdout().lock());
    for (&id, gene) in ids.iter().zip(&genes) {
        for line in gene.horizontal_lines() {
            let record = LineRecord {
                id,
                gene: &names[id],
                y: line.y(),
                x: line.position_hits().iter().map(|ph| ph.x).collect(),
                hits: line.position_hits().iter().map(|ph| ph.hits).collect(),
            };
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn select_gene(everything: &Everything, id: usize) -> stgene::Result<Gene> {
    everything
        .gene(id)
        .cloned()
        .ok_or_else(|| ReadError::OutOfRange(id, everything.num_genes()).into())
}

struct BenchRow {
    format: Format,
    encode: Duration,
    decode: Duration,
    size: usize,
    zstd_size: usize,
}

fn bench(cli: &Cli, everything: &Everything) -> Result<()> {
    let mut rows = Vec::with_capacity(Format::ALL.len());
    for format in Format::ALL {
        let codec = cli.codec(format);

        let start = Instant::now();
        let mut bytes = Vec::new();
        codec.encode(everything, &mut bytes)?;
        let encode = start.elapsed();

        let start = Instant::now();
        let decoded = codec.decode(&bytes)?;
        let decode = start.elapsed();
        if decoded.num_hits() != everything.num_hits() {
            warn!(%format, expected = everything.num_hits(), found = decoded.num_hits(), "hit count differs after decode");
        }

        let zstd_size = zstd::encode_all(bytes.as_slice(), cli.level)?.len();
        info!(%format, size = bytes.len(), "benchmarked format");
        rows.push(BenchRow {
            format,
            encode,
            decode,
            size: bytes.len(),
            zstd_size,
        });
    }

    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12}",
        "format", "encode_ms", "decode_ms", "bytes", "zstd_bytes"
    );
    for row in rows {
        println!(
            "{:<12} {:>12.3} {:>12.3} {:>12} {:>12}",
            row.format.to_string(),
            row.encode.as_secs_f64() * 1e3,
            row.decode.as_secs_f64() * 1e3,
            row.size,
            row.zstd_size,
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Convert {
            in_format,
            input,
            out_format,
            output,
        } => convert(&cli, *in_format, input, *out_format, output),
        Command::Genes { format, input, ids } => genes(&cli, *format, input, ids),
        Command::Bench {
            input,
            synthetic: num_genes,
            spots,
            seed,
        } => {
            let everything = match (input, num_genes) {
                (_, Some(num_genes)) => synthetic(*num_genes, *spots, *seed)?,
                (Some(path), None) => json::parse_path(path)
                    .with_context(|| format!("unable to read {}", path.display()))?,
                (None, None) => bail!("either an input file or --synthetic is required"),
            };
            info!(
                genes = everything.num_genes(),
                spots = everything.num_spots(),
                hits = everything.num_hits(),
                "benchmark dataset ready"
            );
            bench(&cli, &everything)
        }
    }
}
