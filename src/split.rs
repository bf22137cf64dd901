use std::collections::HashSet;
use std::fmt;

/// Dataset partition a mapped record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Split::Train => "train",
            Split::Validation => "validation",
        };
        write!(f, "{s}")
    }
}

/// Exact-string membership test of `chromosome` in `validation`.
///
/// No name normalization is applied: "chr6" and "6" are different chromosomes.
pub fn assign(chromosome: &str, validation: &HashSet<String>) -> Split {
    if validation.contains(chromosome) {
        Split::Validation
    } else {
        Split::Train
    }
}

/// Chromosome-based train/validation assignment.
///
/// An empty validation set sends every record to `Train`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitAssigner {
    validation: HashSet<String>,
}

impl SplitAssigner {
    pub fn new<I, S>(validation_chromosomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            validation: validation_chromosomes.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn assign(&self, chromosome: &str) -> Split {
        assign(chromosome, &self.validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_chromosomes_route_to_validation() {
        let s = SplitAssigner::new(["chr6", "chr17"]);
        assert_eq!(s.assign("chr6"), Split::Validation);
        assert_eq!(s.assign("chr17"), Split::Validation);
        assert_eq!(s.assign("chr1"), Split::Train);
    }

    #[test]
    fn names_are_compared_verbatim() {
        let s = SplitAssigner::new(["chr6"]);
        assert_eq!(s.assign("6"), Split::Train);
        assert_eq!(s.assign("CHR6"), Split::Train);
        assert_eq!(s.assign("chr6 "), Split::Train);
    }

    #[test]
    fn empty_set_is_all_train() {
        let s = SplitAssigner::default();
        assert_eq!(s.assign("chr6"), Split::Train);
        assert_eq!(assign("chrX", &HashSet::new()), Split::Train);
    }
}
