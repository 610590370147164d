//! Absolute locus coordinates to tile-relative base offsets.
//!
//! A tile variant's bases line up with the chromosome interval running from
//! the `begin` of its first position to the `end` of its last position.
//! Recorded [`Translation`]s of insertions and deletions shift the offsets of
//! every base after them, so substrings of indel variants stay aligned with
//! reference coordinates.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

use crate::core::address::{TilePosition, TileVariantId};
use crate::core::tile::TileVariant;
use crate::core::token::{Call, Token};
use crate::core::types::Assembly;
use crate::core::variant::{GenomeVariant, GenomeVariantId};
use crate::library::{IndexError, LocusIndex};

/// Base written for positions that could not be sequenced
pub const GAP_BASE: char = 'N';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error(
        "Genome variant {genome_variant} disagrees with tile variant {tile_variant}: \
         expected {which} bases '{expected}', found '{found}'"
    )]
    TranslationMismatch {
        genome_variant: GenomeVariantId,
        tile_variant: TileVariantId,
        which: &'static str,
        expected: String,
        found: String,
    },

    #[error("No translation links genome variant {genome_variant} to tile variant {tile_variant}")]
    MissingTranslation {
        genome_variant: GenomeVariantId,
        tile_variant: TileVariantId,
    },

    #[error("Tile variant {0} is not in the library")]
    UnknownTileVariant(TileVariantId),

    #[error("Token for {variant} spans {token_span} positions but the variant spans {stored_span}")]
    SpanMismatch {
        variant: TileVariantId,
        token_span: u32,
        stored_span: u32,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Bases each call contributes to a query
///
/// Tile calls are keyed by token; not-well-sequenced calls by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable<T> {
    pub tiles: BTreeMap<Token, T>,
    pub gaps: BTreeMap<TilePosition, T>,
}

impl<T> Default for TranslationTable<T> {
    fn default() -> Self {
        Self {
            tiles: BTreeMap::new(),
            gaps: BTreeMap::new(),
        }
    }
}

impl<T> TranslationTable<T> {
    #[must_use]
    pub fn get(&self, call: &Call) -> Option<&T> {
        match call {
            Call::Tile(token) => self.tiles.get(token),
            Call::NotWellSequenced(position) => self.gaps.get(position),
        }
    }

    #[must_use]
    pub fn contains(&self, call: &Call) -> bool {
        self.get(call).is_some()
    }

    pub fn len(&self) -> usize {
        self.tiles.len() + self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.gaps.is_empty()
    }
}

/// Bases a tile variant contributes relative to a target base
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Window {
    /// The variant lies before the target; bases up to the target
    Before(String),
    /// The variant covers the target
    AtCenter {
        left: String,
        center: String,
        right: String,
    },
    /// The variant lies after the target; bases after the target
    After(String),
}

impl Window {
    /// Bases that extend a sequence backwards from the target
    #[must_use]
    pub fn leading(&self) -> &str {
        match self {
            Self::Before(bases) => bases,
            Self::AtCenter { left, .. } => left,
            Self::After(_) => "",
        }
    }

    /// Bases that extend a sequence forwards from the target
    #[must_use]
    pub fn trailing(&self) -> &str {
        match self {
            Self::After(bases) => bases,
            Self::AtCenter { right, .. } => right,
            Self::Before(_) => "",
        }
    }

    #[must_use]
    pub fn is_center(&self) -> bool {
        matches!(self, Self::AtCenter { .. })
    }
}

/// Maps loci to tile offsets within one assembly
#[derive(Debug, Clone)]
pub struct VariantTranslator<'a> {
    index: LocusIndex<'a>,
    assembly: Assembly,
}

impl<'a> VariantTranslator<'a> {
    pub fn new(index: LocusIndex<'a>, assembly: Assembly) -> Self {
        Self { index, assembly }
    }

    #[must_use]
    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Look up the tile variant a token names
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::UnknownTileVariant` if the library has no such
    /// variant, or `TranslateError::SpanMismatch` if the token's span differs.
    pub fn tile_for(&self, token: Token) -> Result<&'a TileVariant, TranslateError> {
        let tile = self
            .index
            .library()
            .tile_variant(token.variant)
            .ok_or(TranslateError::UnknownTileVariant(token.variant))?;
        if tile.num_positions_spanned != token.span {
            return Err(TranslateError::SpanMismatch {
                variant: token.variant,
                token_span: token.span,
                stored_span: tile.num_positions_spanned,
            });
        }
        Ok(tile)
    }

    /// Absolute `[begin, end)` covered by a tile variant
    ///
    /// For a spanning variant the end comes from the locus of the last
    /// spanned position.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if either position has no locus.
    pub fn variant_bounds(&self, tile: &TileVariant) -> Result<(u64, u64), TranslateError> {
        let begin = self.index.locus_for(&self.assembly, tile.position())?.begin;
        let end = self
            .index
            .locus_for(&self.assembly, tile.last_position())?
            .end;
        Ok((begin, end))
    }

    /// Offset into `tile.sequence` of the absolute base `base`
    fn offset_of(&self, tile: &TileVariant, begin: u64, end: u64, base: u64) -> usize {
        if base <= begin {
            return 0;
        }
        if base >= end {
            return tile.length;
        }

        let library = self.index.library();
        let mut shift: i64 = 0;
        for translation in library.translations_for(tile.id) {
            let Some(variant) = library.genome_variant(translation.genome_variant) else {
                continue;
            };
            if variant.end <= base {
                shift += variant.length_delta();
            } else if variant.start < base {
                let inside = usize::try_from(base - variant.start).unwrap_or(usize::MAX);
                return translation.start + inside.min(translation.end - translation.start);
            }
        }

        let raw = i64::try_from(base - begin).unwrap_or(i64::MAX) + shift;
        usize::try_from(raw.max(0)).map_or(tile.length, |offset| offset.min(tile.length))
    }

    fn slice(&self, tile: &TileVariant, begin: u64, end: u64, low: u64, high: u64) -> String {
        let low = low.max(begin);
        let high = high.min(end);
        if low >= high {
            return String::new();
        }
        let start = self.offset_of(tile, begin, end, low);
        let stop = self.offset_of(tile, begin, end, high).max(start);
        tile.sequence[start..stop].to_string()
    }

    /// Bases of a tile variant intersecting `[low, high)`, tags included
    ///
    /// Returns an empty string for variants call providers cannot name.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if the variant has no locus.
    pub fn bases_in_range(
        &self,
        tile: &TileVariant,
        low: u64,
        high: u64,
    ) -> Result<String, TranslateError> {
        if tile.token().is_none() {
            return Ok(String::new());
        }
        let (begin, end) = self.variant_bounds(tile)?;
        Ok(self.slice(tile, begin, end, low, high))
    }

    /// Bases of a tile variant split around the target base
    ///
    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if the variant has no locus.
    pub fn window_of(&self, tile: &TileVariant, target: u64) -> Result<Window, TranslateError> {
        if tile.token().is_none() {
            return Ok(Window::Before(String::new()));
        }
        let (begin, end) = self.variant_bounds(tile)?;
        Ok(if end <= target {
            Window::Before(self.slice(tile, begin, end, begin, end))
        } else if begin > target {
            Window::After(self.slice(tile, begin, end, begin, end))
        } else {
            Window::AtCenter {
                left: self.slice(tile, begin, end, begin, target),
                center: self.slice(tile, begin, end, target, target + 1),
                right: self.slice(tile, begin, end, target + 1, end),
            }
        })
    }

    /// Gap marker for an unsequenced position, clipped to `[low, high)`
    ///
    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if the position has no locus.
    pub fn gap_bases(
        &self,
        position: TilePosition,
        low: u64,
        high: u64,
    ) -> Result<String, TranslateError> {
        let locus = self.index.locus_for(&self.assembly, position)?;
        Ok(gap(locus.begin.max(low), locus.end.min(high)))
    }

    /// Gap marker for an unsequenced position split around the target base
    ///
    /// # Errors
    ///
    /// Returns `IndexError::LocusNotFound` if the position has no locus.
    pub fn gap_window(&self, position: TilePosition, target: u64) -> Result<Window, TranslateError> {
        let locus = self.index.locus_for(&self.assembly, position)?;
        let (begin, end) = (locus.begin, locus.end);
        Ok(if end <= target {
            Window::Before(gap(begin, end))
        } else if begin > target {
            Window::After(gap(begin, end))
        } else {
            Window::AtCenter {
                left: gap(begin, target),
                center: gap(target, target + 1),
                right: gap(target + 1, end),
            }
        })
    }

    /// Translate the calls of a whole-range query into `table`
    ///
    /// Not-well-sequenced calls are only translated when `with_gaps` is set.
    ///
    /// # Errors
    ///
    /// Returns the first lookup failure.
    pub fn translate_range<'c>(
        &self,
        calls: impl IntoIterator<Item = &'c Call>,
        low: u64,
        high: u64,
        with_gaps: bool,
        table: &mut TranslationTable<String>,
    ) -> Result<(), TranslateError> {
        for call in calls {
            if table.contains(call) {
                continue;
            }
            match *call {
                Call::Tile(token) => {
                    let tile = self.tile_for(token)?;
                    table.tiles.insert(token, self.bases_in_range(tile, low, high)?);
                }
                Call::NotWellSequenced(position) if with_gaps => {
                    table.gaps.insert(position, self.gap_bases(position, low, high)?);
                }
                Call::NotWellSequenced(_) => {}
            }
        }
        Ok(())
    }

    /// Translate the calls of an around-target query into `table`
    ///
    /// Not-well-sequenced calls are only translated when `with_gaps` is set.
    ///
    /// # Errors
    ///
    /// Returns the first lookup failure.
    pub fn translate_window<'c>(
        &self,
        calls: impl IntoIterator<Item = &'c Call>,
        target: u64,
        with_gaps: bool,
        table: &mut TranslationTable<Window>,
    ) -> Result<(), TranslateError> {
        for call in calls {
            if table.contains(call) {
                continue;
            }
            match *call {
                Call::Tile(token) => {
                    let tile = self.tile_for(token)?;
                    table.tiles.insert(token, self.window_of(tile, target)?);
                }
                Call::NotWellSequenced(position) if with_gaps => {
                    table.gaps.insert(position, self.gap_window(position, target)?);
                }
                Call::NotWellSequenced(_) => {}
            }
        }
        Ok(())
    }

    /// Reference bases from the first to the last position, tags shared once
    fn reference_sequence(
        &self,
        first: TilePosition,
        last: TilePosition,
    ) -> Result<String, TranslateError> {
        let library = self.index.library();
        let tag_length = library.tag_length();
        let mut sequence = String::new();
        for step in first.step..=last.step {
            let position = TilePosition { step, ..first };
            let reference = position.reference_variant();
            let tile = library
                .tile_variant(reference)
                .ok_or(TranslateError::UnknownTileVariant(reference))?;
            if sequence.is_empty() {
                sequence.push_str(&tile.sequence);
            } else {
                sequence.push_str(&tile.sequence[tag_length.min(tile.sequence.len())..]);
            }
        }
        Ok(sequence)
    }

    /// Tile-relative `[start, end)` of a genome variant on a tile variant
    ///
    /// Checks the reference bases against the reference tiles of the same
    /// positions and the alternate bases against the tile variant itself.
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::MissingTranslation` if no translation links the
    /// two, and `TranslateError::TranslationMismatch` if either check fails.
    pub fn translate_genome_variant(
        &self,
        genome_variant: &GenomeVariant,
        tile: &TileVariant,
    ) -> Result<(usize, usize), TranslateError> {
        let translation = self
            .index
            .library()
            .translations_for(tile.id)
            .iter()
            .find(|t| t.genome_variant == genome_variant.id)
            .ok_or(TranslateError::MissingTranslation {
                genome_variant: genome_variant.id,
                tile_variant: tile.id,
            })?;

        let locus = self
            .index
            .locus_for(&genome_variant.assembly, tile.position())?;
        let reference = self.reference_sequence(tile.position(), tile.last_position())?;
        let reference_start =
            usize::try_from(genome_variant.start.saturating_sub(locus.begin)).unwrap_or(usize::MAX);
        let reference_end = reference_start.saturating_add(genome_variant.reference_bases.len());
        let found_reference = reference.get(reference_start..reference_end).unwrap_or("");
        if found_reference != genome_variant.reference_bases {
            return Err(mismatch(
                genome_variant,
                tile,
                "reference",
                &genome_variant.reference_bases,
                found_reference,
            ));
        }

        let found_alternate = tile
            .sequence
            .get(translation.start..translation.end)
            .unwrap_or("");
        if found_alternate != genome_variant.alternate_bases {
            return Err(mismatch(
                genome_variant,
                tile,
                "alternate",
                &genome_variant.alternate_bases,
                found_alternate,
            ));
        }

        Ok((translation.start, translation.end))
    }
}

fn gap(low: u64, high: u64) -> String {
    let len = usize::try_from(high.saturating_sub(low)).unwrap_or(0);
    std::iter::repeat(GAP_BASE).take(len).collect()
}

fn mismatch(
    genome_variant: &GenomeVariant,
    tile: &TileVariant,
    which: &'static str,
    expected: &str,
    found: &str,
) -> TranslateError {
    error!(
        genome_variant = %genome_variant.id,
        tile_variant = %tile.id,
        which,
        expected,
        found,
        "Recorded translation disagrees with tile bases"
    );
    TranslateError::TranslationMismatch {
        genome_variant: genome_variant.id,
        tile_variant: tile.id,
        which,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::locus::LocusAnnotation;
    use crate::core::types::Chromosome;
    use crate::core::variant::Translation;
    use crate::library::{LibraryConfig, TileLibrary};

    const TAG_A: &str = "GATTACAGATTACAGATTACAGAT";
    const TAG_B: &str = "CCGGTTAACCGGTTAACCGGTTAA";

    fn position(step: u32) -> TilePosition {
        TilePosition::new(0, 1, step)
    }

    /// step 0 [0,50) = 24 'A' + C + A + TAG_A; step 1 [26,76) = TAG_A + 2 'G' + TAG_B
    fn reference_tiles() -> (String, String) {
        (
            format!("{}CA{TAG_A}", "A".repeat(24)),
            format!("{TAG_A}GG{TAG_B}"),
        )
    }

    fn library() -> TileLibrary {
        let mut library = TileLibrary::new(LibraryConfig::default()).unwrap();
        let (first, second) = reference_tiles();
        library
            .add_tile_variant(TileVariant::new(position(0).reference_variant(), first.clone()))
            .unwrap();
        library
            .add_tile_variant(TileVariant::new(position(1).reference_variant(), second))
            .unwrap();
        for (step, begin) in [(0u32, 0u64), (1, 26)] {
            library
                .add_locus(LocusAnnotation::new(
                    Assembly::Grch37,
                    Chromosome::Autosome(1),
                    position(step),
                    begin,
                    begin + 50,
                ))
                .unwrap();
        }

        // SNP at 24: C -> T
        let mut snp_tile = first.clone();
        snp_tile.replace_range(24..25, "T");
        let snp_id = TileVariantId::new(position(0), 1);
        library.add_tile_variant(TileVariant::new(snp_id, snp_tile)).unwrap();
        library
            .add_genome_variant(genome_variant(1, 24, 25, "C", "T"))
            .unwrap();
        library
            .add_translation(Translation {
                genome_variant: GenomeVariantId(1),
                tile_variant: snp_id,
                start: 24,
                end: 25,
            })
            .unwrap();

        // Deletion of bases 20..23 ("AAA")
        let mut deletion_tile = first.clone();
        deletion_tile.replace_range(20..23, "");
        let deletion_id = TileVariantId::new(position(0), 2);
        library
            .add_tile_variant(TileVariant::new(deletion_id, deletion_tile))
            .unwrap();
        library
            .add_genome_variant(genome_variant(2, 20, 23, "AAA", ""))
            .unwrap();
        library
            .add_translation(Translation {
                genome_variant: GenomeVariantId(2),
                tile_variant: deletion_id,
                start: 20,
                end: 20,
            })
            .unwrap();

        // Insertion of "TT" before base 10
        let mut insertion_tile = first;
        insertion_tile.insert_str(10, "TT");
        let insertion_id = TileVariantId::new(position(0), 3);
        library
            .add_tile_variant(TileVariant::new(insertion_id, insertion_tile))
            .unwrap();
        library
            .add_genome_variant(genome_variant(3, 10, 10, "", "TT"))
            .unwrap();
        library
            .add_translation(Translation {
                genome_variant: GenomeVariantId(3),
                tile_variant: insertion_id,
                start: 10,
                end: 12,
            })
            .unwrap();

        library
    }

    fn genome_variant(id: u64, start: u64, end: u64, reference: &str, alternate: &str) -> GenomeVariant {
        GenomeVariant {
            id: GenomeVariantId(id),
            assembly: Assembly::Grch37,
            chromosome: Chromosome::Autosome(1),
            start,
            end,
            reference_bases: reference.to_string(),
            alternate_bases: alternate.to_string(),
            names: Vec::new(),
        }
    }

    fn translator(library: &TileLibrary) -> VariantTranslator<'_> {
        VariantTranslator::new(LocusIndex::new(library), Assembly::Grch37)
    }

    #[test]
    fn test_bases_in_range_clips_to_variant_bounds() {
        let library = library();
        let translator = translator(&library);
        let tile = library.tile_variant(position(0).reference_variant()).unwrap();
        assert_eq!(translator.bases_in_range(tile, 40, 60).unwrap(), &TAG_A[14..]);
        assert_eq!(translator.bases_in_range(tile, 23, 26).unwrap(), "ACA");
        assert_eq!(translator.bases_in_range(tile, 50, 60).unwrap(), "");

        let tile = library.tile_variant(position(1).reference_variant()).unwrap();
        assert_eq!(translator.bases_in_range(tile, 40, 60).unwrap().len(), 20);
    }

    #[test]
    fn test_unexported_variant_has_no_bases() {
        let mut library = library();
        let hidden = TileVariant::new(TileVariantId::new(position(1), 4), "A".repeat(50)).unexported();
        library.add_tile_variant(hidden.clone()).unwrap();
        assert_eq!(translator(&library).bases_in_range(&hidden, 0, 100).unwrap(), "");
    }

    #[test]
    fn test_offsets_shift_past_indels() {
        let library = library();
        let translator = translator(&library);

        let deletion = library
            .tile_variant(TileVariantId::new(position(0), 2))
            .unwrap();
        // Reference bases 18..26 are "AA" + deleted "AAA" + "A" + "CA"
        assert_eq!(translator.bases_in_range(deletion, 18, 26).unwrap(), "AAACA");
        assert_eq!(translator.bases_in_range(deletion, 21, 22).unwrap(), "");
        assert_eq!(translator.bases_in_range(deletion, 26, 50).unwrap(), TAG_A);

        let insertion = library
            .tile_variant(TileVariantId::new(position(0), 3))
            .unwrap();
        assert_eq!(translator.bases_in_range(insertion, 8, 12).unwrap(), "AATTAA");
        assert_eq!(translator.bases_in_range(insertion, 26, 50).unwrap(), TAG_A);
    }

    #[test]
    fn test_window_of() {
        let library = library();
        let translator = translator(&library);
        let first = library.tile_variant(position(0).reference_variant()).unwrap();
        let second = library.tile_variant(position(1).reference_variant()).unwrap();

        let window = translator.window_of(first, 24).unwrap();
        assert_eq!(
            window,
            Window::AtCenter {
                left: "A".repeat(24),
                center: "C".to_string(),
                right: format!("A{TAG_A}"),
            }
        );
        assert!(matches!(translator.window_of(second, 24).unwrap(), Window::After(_)));
        assert_eq!(translator.window_of(first, 60).unwrap().leading().len(), 50);
        assert_eq!(translator.window_of(second, 60).unwrap().trailing().len(), 15);
    }

    #[test]
    fn test_deleted_target_has_empty_center() {
        let library = library();
        let deletion = library
            .tile_variant(TileVariantId::new(position(0), 2))
            .unwrap();
        match translator(&library).window_of(deletion, 21).unwrap() {
            Window::AtCenter { left, center, right } => {
                assert_eq!(left.len(), 20);
                assert_eq!(center, "");
                assert_eq!(right.len(), 27);
            }
            other => panic!("expected a center window, got {other:?}"),
        }
    }

    #[test]
    fn test_translate_snp() {
        let library = library();
        let translator = translator(&library);
        let tile = library
            .tile_variant(TileVariantId::new(position(0), 1))
            .unwrap();
        let variant = library.genome_variant(GenomeVariantId(1)).unwrap();
        assert_eq!(translator.translate_genome_variant(variant, tile).unwrap(), (24, 25));
    }

    #[test]
    fn test_translate_snp_mismatch() {
        let library = library();
        let translator = translator(&library);
        let tile = library
            .tile_variant(TileVariantId::new(position(0), 1))
            .unwrap();

        let mut wrong_reference = library.genome_variant(GenomeVariantId(1)).unwrap().clone();
        wrong_reference.reference_bases = "G".to_string();
        assert!(matches!(
            translator.translate_genome_variant(&wrong_reference, tile),
            Err(TranslateError::TranslationMismatch { which: "reference", .. })
        ));

        let mut wrong_alternate = library.genome_variant(GenomeVariantId(1)).unwrap().clone();
        wrong_alternate.alternate_bases = "A".to_string();
        assert!(matches!(
            translator.translate_genome_variant(&wrong_alternate, tile),
            Err(TranslateError::TranslationMismatch { which: "alternate", .. })
        ));
    }

    #[test]
    fn test_translate_deletion() {
        let library = library();
        let translator = translator(&library);
        let tile = library
            .tile_variant(TileVariantId::new(position(0), 2))
            .unwrap();
        let variant = library.genome_variant(GenomeVariantId(2)).unwrap();
        assert_eq!(translator.translate_genome_variant(variant, tile).unwrap(), (20, 20));

        let reference = library.tile_variant(position(0).reference_variant()).unwrap();
        assert!(matches!(
            translator.translate_genome_variant(variant, reference),
            Err(TranslateError::MissingTranslation { .. })
        ));
    }

    #[test]
    fn test_tile_for_checks_span() {
        let library = library();
        let translator = translator(&library);
        let token = Token::new(position(0).reference_variant(), 2);
        assert!(matches!(
            translator.tile_for(token),
            Err(TranslateError::SpanMismatch { .. })
        ));
        let token = Token::new(TileVariantId::new(position(0), 9), 1);
        assert!(matches!(
            translator.tile_for(token),
            Err(TranslateError::UnknownTileVariant(_))
        ));
    }

    #[test]
    fn test_translate_range_table() {
        let library = library();
        let translator = translator(&library);
        let calls = vec![
            Call::Tile(Token::new(position(0).reference_variant(), 1)),
            Call::NotWellSequenced(position(1)),
            Call::Tile(Token::new(position(0).reference_variant(), 1)),
        ];

        let mut table = TranslationTable::default();
        translator
            .translate_range(&calls, 40, 60, false, &mut table)
            .unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(&calls[1]).is_none());

        translator
            .translate_range(&calls, 40, 60, true, &mut table)
            .unwrap();
        assert_eq!(table.get(&calls[1]).map(String::len), Some(20));
        assert_eq!(table.get(&calls[0]).map(String::as_str), Some(&TAG_A[14..]));
    }

    #[test]
    fn test_gap_markers() {
        let library = library();
        let translator = translator(&library);
        assert_eq!(translator.gap_bases(position(1), 40, 60).unwrap(), "N".repeat(20));
        match translator.gap_window(position(0), 24).unwrap() {
            Window::AtCenter { left, center, right } => {
                assert_eq!((left.len(), center.len(), right.len()), (24, 1, 25));
            }
            other => panic!("expected a center window, got {other:?}"),
        }
    }
}
