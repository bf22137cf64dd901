pub mod types;
pub mod transcript;

pub use types::{ExonRecord, TranscriptHit, TranscriptIdx};
pub use transcript::TranscriptModel;
