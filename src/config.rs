use std::path::PathBuf;

use crate::annotation::AnnotationKeys;
use crate::error::ConfigError;
use crate::table::TableOptions;

/// Everything one mapping run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub annotation_path: PathBuf,
    pub output_folder: PathBuf,
    /// Chromosomes routed to the validation split (exact names).
    pub validation_chromosomes: Vec<String>,
    pub max_workers: usize,

    /// Serialized index: loaded when present, written after a fresh build otherwise.
    pub index_cache: Option<PathBuf>,
    pub table: TableOptions,
    pub keys: AnnotationKeys,
    pub show_progress: bool,
}

impl RunConfig {
    pub fn new(
        input_path: impl Into<PathBuf>,
        annotation_path: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            annotation_path: annotation_path.into(),
            output_folder: output_folder.into(),
            validation_chromosomes: Vec::new(),
            max_workers: 4,
            index_cache: None,
            table: TableOptions::default(),
            keys: AnnotationKeys::default(),
            show_progress: false,
        }
    }

    pub fn validation_chromosomes<I, S>(mut self, chroms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validation_chromosomes = chroms.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn index_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_cache = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}
