use thiserror::Error;
use tracing::debug;

use crate::core::address::{TilePosition, TileVariantId};
use crate::core::locus::LocusAnnotation;
use crate::core::types::{Assembly, Chromosome};
use crate::library::{IndexError, LocusIndex};
use crate::utils::validation::{validate_range, RangeError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(
        "No tile positions cover {chromosome}:{low}-{high} in {assembly}{}",
        nearest_hint(.nearest)
    )]
    LocusNotFound {
        assembly: Assembly,
        chromosome: Chromosome,
        low: u64,
        high: u64,
        nearest: Option<(u64, u64)>,
    },

    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    #[error("Liftover from {from} to {to} is not supported")]
    UnsupportedLiftover { from: Assembly, to: Assembly },

    #[error(transparent)]
    Index(#[from] IndexError),
}

fn nearest_hint(nearest: &Option<(u64, u64)>) -> String {
    match nearest {
        Some((begin, end)) => format!(" (loaded loci span {begin}-{end})"),
        None => " (no loci loaded for this chromosome)".to_string(),
    }
}

/// Tile positions covering a locus range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRange {
    pub assembly: Assembly,
    pub chromosome: Chromosome,
    pub low: u64,
    pub high: u64,
    /// Loci of the covering positions, ordered by `begin`
    pub loci: Vec<LocusAnnotation>,
    /// Variants from earlier positions that span into the first position
    pub spanning: Vec<TileVariantId>,
}

impl ResolvedRange {
    pub fn positions(&self) -> impl Iterator<Item = TilePosition> + '_ {
        self.loci.iter().map(|l| l.position)
    }

    /// First covering position
    #[must_use]
    pub fn first(&self) -> TilePosition {
        self.loci[0].position
    }

    /// Last covering position
    #[must_use]
    pub fn last(&self) -> TilePosition {
        self.loci[self.loci.len() - 1].position
    }

    /// Earliest position a call over this range can start at
    #[must_use]
    pub fn low_position(&self) -> TilePosition {
        self.spanning
            .iter()
            .map(|v| v.position)
            .chain(std::iter::once(self.first()))
            .min()
            .unwrap_or_else(|| self.first())
    }
}

/// Finds the tile positions that cover a locus range
#[derive(Debug, Clone, Copy)]
pub struct RangeResolver<'a> {
    index: LocusIndex<'a>,
}

impl<'a> RangeResolver<'a> {
    pub fn new(index: LocusIndex<'a>) -> Self {
        Self { index }
    }

    #[must_use]
    pub fn index(&self) -> &LocusIndex<'a> {
        &self.index
    }

    /// Resolve the 0-based half-open range `[low, high)`
    ///
    /// A range crossing a path boundary yields the positions of each path
    /// concatenated in `begin` order.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidRange` for empty or oversized ranges,
    /// `ResolveError::LocusNotFound` if no position intersects the range, and
    /// any index error from the spanning lookup.
    pub fn resolve(
        &self,
        assembly: &Assembly,
        chromosome: &Chromosome,
        low: u64,
        high: u64,
    ) -> Result<ResolvedRange, ResolveError> {
        validate_range(low, high)?;

        // The chromosome index holds every path, ordered by begin
        let loci: Vec<LocusAnnotation> = self
            .index
            .loci_in_range(assembly, chromosome, low, high)
            .into_iter()
            .cloned()
            .collect();

        let Some(first) = loci.first() else {
            return Err(ResolveError::LocusNotFound {
                assembly: assembly.clone(),
                chromosome: chromosome.clone(),
                low,
                high,
                nearest: self.index.nearest_bounds(assembly, chromosome),
            });
        };

        let spanning = self.spanning_into(first.position)?;
        debug!(
            chromosome = %chromosome,
            low,
            high,
            positions = loci.len(),
            spanning = spanning.len(),
            "Resolved range"
        );

        Ok(ResolvedRange {
            assembly: assembly.clone(),
            chromosome: chromosome.clone(),
            low,
            high,
            loci,
            spanning,
        })
    }

    /// Resolve a range given in one assembly against loci of another
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::UnsupportedLiftover` whenever the assemblies differ.
    pub fn resolve_lifted(
        &self,
        from: &Assembly,
        to: &Assembly,
        chromosome: &Chromosome,
        low: u64,
        high: u64,
    ) -> Result<ResolvedRange, ResolveError> {
        if from != to {
            return Err(ResolveError::UnsupportedLiftover {
                from: from.clone(),
                to: to.clone(),
            });
        }
        self.resolve(from, chromosome, low, high)
    }

    /// Variants at earlier positions of the path whose span reaches `position`
    ///
    /// # Errors
    ///
    /// Returns `IndexError::MissingStatistics` under a strict fallback, or an
    /// address error for positions outside the configured widths.
    pub fn spanning_into(&self, position: TilePosition) -> Result<Vec<TileVariantId>, ResolveError> {
        let max_span = self.index.max_span_in_path(position.path)?;
        let mut spanning = Vec::new();
        for k in 1..=max_span {
            let Some(earlier) = position.step_back(k) else {
                break;
            };
            spanning.extend(
                self.index
                    .variants_at(earlier)?
                    .into_iter()
                    .filter(|v| v.num_positions_spanned > k)
                    .map(|v| v.id),
            );
        }
        spanning.sort();
        Ok(spanning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tile::TileVariant;
    use crate::core::variant::SpanningStatistic;
    use crate::library::{LibraryConfig, StatisticsFallback, TileLibrary};

    fn position(path: u32, step: u32) -> TilePosition {
        TilePosition::new(0, path, step)
    }

    /// Path 1 holds steps 0..4 at begin 0, 26, 52, 78; path 2 continues at 104
    fn library() -> TileLibrary {
        let mut library = TileLibrary::new(LibraryConfig::default()).unwrap();
        let mut add = |path: u32, step: u32, begin: u64| {
            let p = position(path, step);
            library
                .add_tile_variant(TileVariant::new(p.reference_variant(), "A".repeat(50)))
                .unwrap();
            library
                .add_locus(LocusAnnotation::new(
                    Assembly::Grch37,
                    Chromosome::Autosome(1),
                    p,
                    begin,
                    begin + 50,
                ))
                .unwrap();
        };
        for step in 0..4 {
            add(1, step, u64::from(step) * 26);
        }
        add(2, 0, 104);
        add(2, 1, 130);
        library
    }

    fn steps(range: &ResolvedRange) -> Vec<(u32, u32)> {
        range.positions().map(|p| (p.path, p.step)).collect()
    }

    #[test]
    fn test_resolve_orders_by_begin() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let range = resolver
            .resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 40, 60)
            .unwrap();
        assert_eq!(steps(&range), vec![(1, 0), (1, 1), (1, 2)]);
        assert!(range.spanning.is_empty());
        assert!(range.loci.windows(2).all(|w| w[0].begin <= w[1].begin));
    }

    #[test]
    fn test_resolve_crosses_path_boundary() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let range = resolver
            .resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 103, 140)
            .unwrap();
        assert_eq!(steps(&range), vec![(1, 3), (2, 0), (2, 1)]);
        assert_eq!(range.first(), position(1, 3));
        assert_eq!(range.last(), position(2, 1));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let chr1 = Chromosome::Autosome(1);
        let first = resolver.resolve(&Assembly::Grch37, &chr1, 10, 120).unwrap();
        let second = resolver.resolve(&Assembly::Grch37, &chr1, 10, 120).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_locus_not_found_carries_nearest_bounds() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let err = resolver
            .resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 500, 600)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::LocusNotFound {
                nearest: Some((0, 180)),
                ..
            }
        ));
        assert!(err.to_string().contains("0-180"));

        let err = resolver
            .resolve(&Assembly::Grch37, &Chromosome::X, 0, 10)
            .unwrap_err();
        assert!(matches!(err, ResolveError::LocusNotFound { nearest: None, .. }));
    }

    #[test]
    fn test_empty_range_rejected() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        assert!(matches!(
            resolver.resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 60, 40),
            Err(ResolveError::InvalidRange(RangeError::Empty { .. }))
        ));
    }

    #[test]
    fn test_spanning_variant_attached_to_first_position_only() {
        let mut library = library();
        let long = TileVariant::new(
            TileVariantId::new(position(1, 0), 1),
            "C".repeat(102),
        )
        .with_span(3);
        library.add_tile_variant(long).unwrap();

        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let chr1 = Chromosome::Autosome(1);

        // Starts inside step 1: the variant at step 0 spans steps 0..=2
        let range = resolver.resolve(&Assembly::Grch37, &chr1, 60, 70).unwrap();
        assert_eq!(range.first(), position(1, 1));
        assert_eq!(range.spanning, vec![TileVariantId::new(position(1, 0), 1)]);
        assert_eq!(range.low_position(), position(1, 0));

        // Starts inside step 3: out of reach of a three-position variant
        let range = resolver.resolve(&Assembly::Grch37, &chr1, 100, 103).unwrap();
        assert_eq!(range.first(), position(1, 2));
        assert_eq!(range.spanning, vec![TileVariantId::new(position(1, 0), 1)]);
        let range = resolver.resolve(&Assembly::Grch37, &chr1, 104, 110).unwrap();
        assert!(range.spanning.is_empty());
    }

    #[test]
    fn test_stale_statistics_understate_spanning() {
        let mut library = library();
        library
            .add_tile_variant(
                TileVariant::new(TileVariantId::new(position(1, 0), 1), "C".repeat(102)).with_span(3),
            )
            .unwrap();
        library.set_spanning_statistic(SpanningStatistic {
            path: 1,
            max_num_positions_spanned: 1,
        });
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let range = resolver
            .resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 80, 90)
            .unwrap();
        assert_eq!(range.first(), position(1, 2));
        assert!(range.spanning.is_empty());
    }

    #[test]
    fn test_strict_statistics() {
        let library = library();
        let index = LocusIndex::new(&library).with_fallback(StatisticsFallback::Fail);
        let resolver = RangeResolver::new(index);
        assert!(matches!(
            resolver.resolve(&Assembly::Grch37, &Chromosome::Autosome(1), 40, 60),
            Err(ResolveError::Index(IndexError::MissingStatistics { path: 1 }))
        ));
    }

    #[test]
    fn test_liftover_unsupported() {
        let library = library();
        let resolver = RangeResolver::new(LocusIndex::new(&library));
        let chr1 = Chromosome::Autosome(1);
        assert!(matches!(
            resolver.resolve_lifted(&Assembly::Grch38, &Assembly::Grch37, &chr1, 40, 60),
            Err(ResolveError::UnsupportedLiftover { .. })
        ));
        assert!(resolver
            .resolve_lifted(&Assembly::Grch37, &Assembly::Grch37, &chr1, 40, 60)
            .is_ok());
    }
}
