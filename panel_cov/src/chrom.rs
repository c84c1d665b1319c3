use std::{fmt, sync::Arc};

/// Chromosome identifier
///
/// Numeric chromosome names (1, 2, ...) are stored as integers, everything else
/// (X, Y, MT, chr1, ...) is kept as the original string.  Both the region catalog
/// and the depth reader go through ChromosomeId::new() so that lookups between the two
/// always agree.
///
/// Ordering puts all numeric chromosomes first (in numeric order) followed by the
/// named chromosomes in lexical order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChromosomeId {
    Numeric(u32),
    Named(Arc<str>),
}

impl ChromosomeId {
    pub fn new(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(i) => Self::Numeric(i),
            Err(_) => Self::Named(Arc::from(s)),
        }
    }
}

impl fmt::Display for ChromosomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(i) => write!(f, "{}", i),
            Self::Named(s) => f.write_str(s),
        }
    }
}
