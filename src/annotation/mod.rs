pub mod builder;
pub mod io;

pub use builder::{AnnotationBuilder, AnnotationKeys, ExtractStats};
pub use io::{AnnotationReader, AnnotationRecord, Dialect, ParseError};
