use serde::{Deserialize, Serialize};

use crate::core::address::TilePosition;
use crate::core::types::{Assembly, Chromosome};

/// Absolute chromosome interval covered by a tile position in one assembly
///
/// Intervals are 0-based and half-open. Adjacent positions of a path overlap
/// by exactly the library's tag length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusAnnotation {
    pub assembly: Assembly,
    pub chromosome: Chromosome,
    pub position: TilePosition,
    pub begin: u64,
    pub end: u64,
}

impl LocusAnnotation {
    pub fn new(
        assembly: Assembly,
        chromosome: Chromosome,
        position: TilePosition,
        begin: u64,
        end: u64,
    ) -> Self {
        Self {
            assembly,
            chromosome,
            position,
            begin,
            end,
        }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the interval intersects `[low, high)`
    #[must_use]
    pub fn intersects(&self, low: u64, high: u64) -> bool {
        self.begin < high && low < self.end
    }

    #[must_use]
    pub fn contains(&self, base: u64) -> bool {
        self.begin <= base && base < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(begin: u64, end: u64) -> LocusAnnotation {
        LocusAnnotation::new(
            Assembly::Grch37,
            Chromosome::Autosome(1),
            TilePosition::new(0, 0, 0),
            begin,
            end,
        )
    }

    #[test]
    fn test_intersects_half_open() {
        let l = locus(26, 76);
        assert!(l.intersects(40, 60));
        assert!(l.intersects(0, 27));
        assert!(!l.intersects(0, 26));
        assert!(!l.intersects(76, 100));
        assert!(l.intersects(75, 100));
    }

    #[test]
    fn test_contains() {
        let l = locus(0, 50);
        assert!(l.contains(0));
        assert!(l.contains(49));
        assert!(!l.contains(50));
        assert_eq!(l.len(), 50);
    }
}
