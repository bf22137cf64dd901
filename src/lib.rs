//! gtf_tx_coords
//!
//! Maps genomic positions onto spliced transcript coordinates using a
//! GTF/GFF3 annotation, and splits the mapped records into training and
//! validation sets by chromosome.
//! Coordinates are 0-based, half-open throughout the library.

pub mod types;
pub mod error;
pub mod model;
pub mod annotation;
pub mod index;
pub mod split;
pub mod table;
pub mod batch;
pub mod config;
pub mod pipeline;

pub use index::{AnnotationIndex, ChromIndex, IndexSource};

pub use annotation::{AnnotationBuilder, AnnotationKeys};

pub use types::{Exon, Strand};
pub use error::{ConfigError, IndexError, MapError, TableError};

pub use model::{ExonRecord, TranscriptHit, TranscriptIdx, TranscriptModel};

pub use split::{Split, SplitAssigner};
pub use table::{InputRecord, InputTable, PositionBase, TableOptions};
pub use batch::{BatchConfig, BatchOutput, BatchStats, DropCause, DroppedRecord, MappedRecord};
pub use config::RunConfig;
pub use pipeline::RunSummary;
