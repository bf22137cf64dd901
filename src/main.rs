use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use gtf_tx_coords::pipeline;
use gtf_tx_coords::{AnnotationBuilder, AnnotationIndex, AnnotationKeys, PositionBase, RunConfig, TableOptions};

/// Map genomic positions to transcript positions and split by chromosome.
#[derive(Parser, Debug)]
#[command(name = "g2t")]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map an input table onto transcripts and write train/validation outputs
    Map(MapArgs),

    /// Build an index from a GTF/GFF annotation and write it to disk
    Build(BuildArgs),

    /// Load an index from disk and print summary stats
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Input table with a header row (.csv/.tsv, optionally .gz)
    #[arg(long, short)]
    input: PathBuf,

    /// Annotation file (.gtf/.gff/.gff3, optionally .gz)
    #[arg(long, short)]
    annotation: PathBuf,

    /// Folder receiving train.tsv, validation.tsv and dropped.tsv
    #[arg(long, short)]
    output_folder: PathBuf,

    /// Chromosomes reserved for validation (exact names)
    #[arg(long = "val-chroms", value_name = "CHROM", num_args = 0..)]
    val_chroms: Vec<String>,

    /// Number of parallel workers
    #[arg(long, short = 'w', default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    max_workers: u32,

    /// Index cache: loaded if it exists, written after building otherwise
    #[arg(long)]
    index: Option<PathBuf>,

    /// Input field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Column holding the chromosome name
    #[arg(long, default_value = "chrom")]
    chrom_col: String,

    /// Column holding the genomic position
    #[arg(long, default_value = "pos")]
    pos_col: String,

    /// Optional column holding the strand (+/-/.)
    #[arg(long, default_value = "strand")]
    strand_col: String,

    /// Match transcripts on both strands, whatever the strand column says
    #[arg(long)]
    ignore_strand: bool,

    /// Input positions are 0-based (default: 1-based like GTF)
    #[arg(long)]
    zero_based: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Input annotation file (.gtf/.gff/.gff3)
    #[arg(long, short)]
    annotation: PathBuf,

    /// Output serialized index file
    #[arg(long, short)]
    index: PathBuf,

    #[command(flatten)]
    keys: KeyArgs,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Serialized index file
    #[arg(long, short)]
    index: PathBuf,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Attribute keys to use for transcript ID (repeatable, first present wins)
    #[arg(
        long = "transcript-id-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["transcript_id".to_string(), "transcript".to_string()]
    )]
    transcript_id_keys: Vec<String>,

    /// GFF3 exon->transcript linkage keys (repeatable)
    #[arg(
        long = "parent-key",
        value_name = "KEY",
        num_args = 1..,
        default_values_t = vec!["Parent".to_string()]
    )]
    parent_keys: Vec<String>,

    /// Feature types that count as exons (repeatable)
    #[arg(
        long = "exon-feature-type",
        value_name = "TYPE",
        num_args = 1..,
        default_values_t = vec!["exon".to_string()]
    )]
    exon_feature_types: Vec<String>,
}

impl From<KeyArgs> for AnnotationKeys {
    fn from(args: KeyArgs) -> Self {
        AnnotationKeys {
            transcript_id_keys: args.transcript_id_keys,
            parent_keys: args.parent_keys,
            exon_feature_types: args.exon_feature_types,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Map(args) => {
            let config = RunConfig {
                input_path: args.input,
                annotation_path: args.annotation,
                output_folder: args.output_folder,
                validation_chromosomes: args.val_chroms,
                max_workers: args.max_workers as usize,
                index_cache: args.index,
                table: TableOptions {
                    delimiter: args.delimiter,
                    chrom_col: args.chrom_col,
                    pos_col: args.pos_col,
                    strand_col: (!args.ignore_strand).then_some(args.strand_col),
                    position_base: if args.zero_based {
                        PositionBase::Zero
                    } else {
                        PositionBase::One
                    },
                },
                keys: args.keys.into(),
                show_progress: !args.no_progress,
            };

            let summary = pipeline::run(&config)?;
            eprintln!(
                "Outputs written to {} ({} train, {} validation, {} dropped)",
                config.output_folder.display(),
                summary.stats.train,
                summary.stats.validation,
                summary.stats.dropped()
            );
        }

        Command::Build(args) => {
            let idx = AnnotationBuilder::new()
                .keys(args.keys.into())
                .build_from_path(&args.annotation)
                .with_context(|| format!("building index from {}", args.annotation.display()))?;

            println!("{idx}");

            idx.save(&args.index)
                .with_context(|| format!("writing index to {}", args.index.display()))?;

            eprintln!("Index written to {}", args.index.display());
        }

        Command::Stats(args) => {
            let idx = AnnotationIndex::load(&args.index)
                .with_context(|| format!("reading index {}", args.index.display()))?;
            println!("{idx}");
        }
    }

    Ok(())
}
