use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::address::{AddressError, TilePosition};
use crate::core::locus::LocusAnnotation;
use crate::core::tile::TileVariant;
use crate::core::types::{Assembly, Chromosome};

use super::store::TileLibrary;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("No locus for tile position {position} in {assembly}")]
    LocusNotFound {
        assembly: Assembly,
        position: TilePosition,
    },

    #[error("Path {path:#x} holds no tile variants")]
    EmptyPath { path: u32 },

    #[error("No spanning statistic recorded for path {path:#x}")]
    MissingStatistics { path: u32 },

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// What `max_span_in_path` does when a path has no cached statistic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsFallback {
    /// Scan every variant of the path (slow on large paths)
    #[default]
    Scan,
    /// Fail with `IndexError::MissingStatistics`
    Fail,
}

/// Locus and spanning-statistic lookups over a [`TileLibrary`]
#[derive(Debug, Clone, Copy)]
pub struct LocusIndex<'a> {
    library: &'a TileLibrary,
    fallback: StatisticsFallback,
}

impl<'a> LocusIndex<'a> {
    pub fn new(library: &'a TileLibrary) -> Self {
        Self {
            library,
            fallback: StatisticsFallback::default(),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: StatisticsFallback) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn library(&self) -> &'a TileLibrary {
        self.library
    }

    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if the position has no locus in `assembly`.
    pub fn locus_for(
        &self,
        assembly: &Assembly,
        position: TilePosition,
    ) -> Result<&'a LocusAnnotation, IndexError> {
        self.library
            .locus(assembly, position)
            .ok_or_else(|| IndexError::LocusNotFound {
                assembly: assembly.clone(),
                position,
            })
    }

    /// Loci on a chromosome intersecting `[low, high)`, ordered by `begin`
    ///
    /// Ties on `begin` are broken by position so the order is stable.
    #[must_use]
    pub fn loci_in_range(
        &self,
        assembly: &Assembly,
        chromosome: &Chromosome,
        low: u64,
        high: u64,
    ) -> Vec<&'a LocusAnnotation> {
        let Some(loci) = self.library.loci_on(assembly, chromosome) else {
            return Vec::new();
        };
        let origin = TilePosition::new(0, 0, 0);
        let start = (low.saturating_sub(loci.max_len), origin);
        loci.by_begin
            .range(start..(high, origin))
            .filter(|&(_, &end)| end > low)
            .filter_map(|((_, position), _)| self.library.locus(assembly, *position))
            .collect()
    }

    /// Smallest `begin` and largest `end` loaded for a chromosome
    #[must_use]
    pub fn nearest_bounds(&self, assembly: &Assembly, chromosome: &Chromosome) -> Option<(u64, u64)> {
        let loci = self.library.loci_on(assembly, chromosome)?;
        let first = loci.by_begin.keys().next()?.0;
        let last = loci.by_begin.values().copied().max()?;
        Some((first, last))
    }

    /// Largest number of positions any variant in the path spans
    ///
    /// The cached statistic may lag behind freshly ingested data and should
    /// be treated as an advisory bound.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::MissingStatistics` when no statistic is cached
    /// and the fallback is [`StatisticsFallback::Fail`].
    pub fn max_span_in_path(&self, path: u32) -> Result<u32, IndexError> {
        if let Some(max) = self.library.cached_max_span(path) {
            return Ok(max);
        }
        match self.fallback {
            StatisticsFallback::Fail => Err(IndexError::MissingStatistics { path }),
            StatisticsFallback::Scan => {
                warn!(
                    path = format_args!("{path:#x}"),
                    "No spanning statistic cached, scanning the path"
                );
                Ok(self.library.scan_max_span(path)?)
            }
        }
    }

    /// Last position of a path that holds a tile variant
    ///
    /// # Errors
    ///
    /// Returns `IndexError::EmptyPath` if no variant is stored in the path.
    pub fn highest_position_in_path(&self, path: u32) -> Result<TilePosition, IndexError> {
        self.library
            .variants_in_path(path)?
            .map(TileVariant::last_position)
            .max()
            .ok_or(IndexError::EmptyPath { path })
    }

    /// Variants stored at a position, reference first
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Address` if the position does not fit the address widths.
    pub fn variants_at(&self, position: TilePosition) -> Result<Vec<&'a TileVariant>, IndexError> {
        Ok(self.library.variants_at(position)?.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::TileVariantId;
    use crate::core::variant::SpanningStatistic;
    use crate::library::store::LibraryConfig;

    fn position(path: u32, step: u32) -> TilePosition {
        TilePosition::new(0, path, step)
    }

    /// Path 1 with three reference tiles at [0,50) [26,76) [52,102) and a
    /// two-position variant at step 0
    fn library() -> TileLibrary {
        let mut library = TileLibrary::new(LibraryConfig::default()).unwrap();
        for step in 0..3u32 {
            let p = position(1, step);
            library
                .add_tile_variant(TileVariant::new(p.reference_variant(), "A".repeat(50)))
                .unwrap();
            let begin = u64::from(step) * 26;
            library
                .add_locus(LocusAnnotation::new(
                    Assembly::Grch37,
                    Chromosome::Autosome(1),
                    p,
                    begin,
                    begin + 50,
                ))
                .unwrap();
        }
        library
            .add_tile_variant(
                TileVariant::new(TileVariantId::new(position(1, 0), 1), "C".repeat(76)).with_span(2),
            )
            .unwrap();
        library
    }

    #[test]
    fn test_locus_for() {
        let library = library();
        let index = LocusIndex::new(&library);
        let locus = index.locus_for(&Assembly::Grch37, position(1, 1)).unwrap();
        assert_eq!((locus.begin, locus.end), (26, 76));

        let err = index
            .locus_for(&Assembly::Grch38, position(1, 1))
            .unwrap_err();
        assert!(matches!(err, IndexError::LocusNotFound { .. }));
    }

    #[test]
    fn test_loci_in_range_ordered() {
        let library = library();
        let index = LocusIndex::new(&library);
        let chr1 = Chromosome::Autosome(1);

        let steps: Vec<u32> = index
            .loci_in_range(&Assembly::Grch37, &chr1, 40, 60)
            .iter()
            .map(|l| l.position.step)
            .collect();
        assert_eq!(steps, vec![0, 1, 2]);

        let steps: Vec<u32> = index
            .loci_in_range(&Assembly::Grch37, &chr1, 0, 26)
            .iter()
            .map(|l| l.position.step)
            .collect();
        assert_eq!(steps, vec![0]);

        assert!(index
            .loci_in_range(&Assembly::Grch37, &chr1, 102, 200)
            .is_empty());
        assert!(index
            .loci_in_range(&Assembly::Grch37, &Chromosome::X, 0, 10)
            .is_empty());
    }

    #[test]
    fn test_nearest_bounds() {
        let library = library();
        let index = LocusIndex::new(&library);
        assert_eq!(
            index.nearest_bounds(&Assembly::Grch37, &Chromosome::Autosome(1)),
            Some((0, 102))
        );
        assert_eq!(index.nearest_bounds(&Assembly::Grch37, &Chromosome::Y), None);
    }

    #[test]
    fn test_max_span_uses_cache_then_fallback() {
        let mut library = library();
        assert_eq!(LocusIndex::new(&library).max_span_in_path(1).unwrap(), 2);

        let strict = LocusIndex::new(&library).with_fallback(StatisticsFallback::Fail);
        assert_eq!(
            strict.max_span_in_path(1),
            Err(IndexError::MissingStatistics { path: 1 })
        );

        library.set_spanning_statistic(SpanningStatistic {
            path: 1,
            max_num_positions_spanned: 5,
        });
        let strict = LocusIndex::new(&library).with_fallback(StatisticsFallback::Fail);
        assert_eq!(strict.max_span_in_path(1).unwrap(), 5);
    }

    #[test]
    fn test_highest_position_in_path() {
        let library = library();
        let index = LocusIndex::new(&library);
        assert_eq!(index.highest_position_in_path(1).unwrap(), position(1, 2));
        assert_eq!(
            index.highest_position_in_path(7),
            Err(IndexError::EmptyPath { path: 7 })
        );
    }

    #[test]
    fn test_variants_at() {
        let library = library();
        let index = LocusIndex::new(&library);
        assert_eq!(index.variants_at(position(1, 0)).unwrap().len(), 2);
        assert_eq!(index.variants_at(position(1, 1)).unwrap().len(), 1);
        assert!(index.variants_at(position(1, 9)).unwrap().is_empty());
    }
}
