//! One complete mapping run: index → input table → batch → output files.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::annotation::AnnotationBuilder;
use crate::batch::{self, BatchConfig, BatchStats};
use crate::config::RunConfig;
use crate::index::{AnnotationIndex, IndexSource};
use crate::split::SplitAssigner;
use crate::table::{self, InputTable};

pub const TRAIN_FILE: &str = "train.tsv";
pub const VALIDATION_FILE: &str = "validation.tsv";
pub const DROPPED_FILE: &str = "dropped.tsv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: BatchStats,
    pub train_path: PathBuf,
    pub validation_path: PathBuf,
    pub dropped_path: PathBuf,
}

/// Load the cached index if there is one built from the same annotation path
/// and keys, otherwise build it from the annotation (and write the cache when
/// a path was configured).
pub fn load_or_build_index(config: &RunConfig) -> Result<AnnotationIndex> {
    let expected = IndexSource {
        annotation: config.annotation_path.clone(),
        keys: config.keys.clone(),
    };

    if let Some(cache) = &config.index_cache {
        if cache.exists() {
            log::info!("loading cached index {}", cache.display());
            let idx = AnnotationIndex::load(cache)
                .with_context(|| format!("reading index cache {}", cache.display()))?;
            if idx.source() == Some(&expected) {
                return Ok(idx);
            }
            log::warn!(
                "index cache {} was built from another annotation or key set, rebuilding",
                cache.display()
            );
        }
    }

    let idx = AnnotationBuilder::new()
        .keys(config.keys.clone())
        .build_from_path(&config.annotation_path)
        .with_context(|| {
            format!(
                "building index from annotation {}",
                config.annotation_path.display()
            )
        })?;

    if let Some(cache) = &config.index_cache {
        idx.save(cache)
            .with_context(|| format!("writing index cache {}", cache.display()))?;
        log::info!("index cached to {}", cache.display());
    }

    Ok(idx)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(f))
}

/// Run the whole mapping. Dropped records are reported, not treated as failures.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate().context("invalid configuration")?;

    let index = load_or_build_index(config)?;

    let input = InputTable::from_path(&config.input_path, &config.table)
        .with_context(|| format!("reading input table {}", config.input_path.display()))?;
    log::info!(
        "read {} records from {}",
        input.records.len(),
        config.input_path.display()
    );

    let splitter = SplitAssigner::new(config.validation_chromosomes.iter().cloned());
    for chrom in &config.validation_chromosomes {
        if !index.contains_chromosome(chrom) {
            log::warn!("validation chromosome '{chrom}' is not in the annotation");
        }
    }

    let batch_config = BatchConfig::new(config.max_workers).show_progress(config.show_progress);
    let out = batch::run(&input.records, &index, &splitter, &batch_config)?;

    std::fs::create_dir_all(&config.output_folder).with_context(|| {
        format!("creating output folder {}", config.output_folder.display())
    })?;

    let train_path = config.output_folder.join(TRAIN_FILE);
    let validation_path = config.output_folder.join(VALIDATION_FILE);
    let dropped_path = config.output_folder.join(DROPPED_FILE);

    table::write_mapped(create(&train_path)?, &input.header, &out.train)
        .with_context(|| format!("writing {}", train_path.display()))?;
    table::write_mapped(create(&validation_path)?, &input.header, &out.validation)
        .with_context(|| format!("writing {}", validation_path.display()))?;
    table::write_dropped(create(&dropped_path)?, &input.header, &out.dropped)
        .with_context(|| format!("writing {}", dropped_path.display()))?;

    log::info!("{}", out.stats);
    if out.stats.unknown_chromosome > 0 {
        log::warn!(
            "{} records on chromosomes absent from the annotation (names are matched exactly, e.g. 'chr6' != '6')",
            out.stats.unknown_chromosome
        );
    }

    Ok(RunSummary {
        stats: out.stats,
        train_path,
        validation_path,
        dropped_path,
    })
}
