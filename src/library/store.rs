use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::address::{AddressCodec, AddressConfig, AddressError, TilePosition, TileVariantId};
use crate::core::locus::LocusAnnotation;
use crate::core::tile::TileVariant;
use crate::core::types::{Assembly, Chromosome, DEFAULT_TAG_LENGTH};
use crate::core::variant::{GenomeVariant, GenomeVariantId, SpanningStatistic, Translation};
use crate::utils::validation::{compute_md5, is_valid_sequence, normalize_md5};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Failed to read library: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse library: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid address in library: {0}")]
    Address(#[from] AddressError),

    #[error("Library integrity error: {0}")]
    Integrity(String),
}

/// Library file format version for compatibility checking
pub const LIBRARY_VERSION: &str = "1.0.0";

/// Per-path entry of the path-length table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub path: u32,
    pub chromosome: Chromosome,
    /// Number of steps the path was built with; every step is below this
    pub num_steps: u32,
}

/// Immutable settings a library was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryConfig {
    pub tag_length: usize,
    pub address: AddressConfig,
    /// Path version every stored position carries
    pub path_version: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            tag_length: DEFAULT_TAG_LENGTH,
            address: AddressConfig::default(),
            path_version: 0,
        }
    }
}

/// Serializable library format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryData {
    pub version: String,
    pub created_at: String,
    #[serde(default = "default_tag_length")]
    pub tag_length: usize,
    #[serde(default)]
    pub address: AddressConfig,
    #[serde(default)]
    pub path_version: u32,
    #[serde(default)]
    pub paths: Vec<PathInfo>,
    pub tile_variants: Vec<TileVariant>,
    pub loci: Vec<LocusAnnotation>,
    #[serde(default)]
    pub genome_variants: Vec<GenomeVariant>,
    #[serde(default)]
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub spanning_statistics: Vec<SpanningStatistic>,
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn default_tag_length() -> usize {
    DEFAULT_TAG_LENGTH
}

/// Loci of one chromosome in one assembly, ordered by `(begin, position)`
#[derive(Debug, Default)]
pub(crate) struct ChromosomeLoci {
    pub(crate) by_begin: BTreeMap<(u64, TilePosition), u64>,
    /// Longest interval on the chromosome, bounds the backwards scan in range lookups
    pub(crate) max_len: u64,
}

/// Read-only store of tile variants, loci, genome variants and statistics
#[derive(Debug)]
pub struct TileLibrary {
    config: LibraryConfig,
    codec: AddressCodec,

    /// Path-length table, keyed by path
    paths: BTreeMap<u32, PathInfo>,

    /// Index: encoded tile variant -> variant
    variants: BTreeMap<u64, TileVariant>,

    /// Index: (assembly, position) -> locus
    loci: HashMap<(Assembly, TilePosition), LocusAnnotation>,

    /// Index: (assembly, chromosome) -> loci ordered by begin
    chromosome_loci: HashMap<(Assembly, Chromosome), ChromosomeLoci>,

    genome_variants: HashMap<GenomeVariantId, GenomeVariant>,

    /// Index: tile variant -> translations of genome variants onto it
    translations: HashMap<TileVariantId, Vec<Translation>>,

    /// Cached per-path maximum span
    spanning_statistics: HashMap<u32, u32>,
}

impl TileLibrary {
    /// Create an empty library
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Address` if the address widths are unusable, or
    /// `LibraryError::Integrity` if the tag length is zero.
    pub fn new(config: LibraryConfig) -> Result<Self, LibraryError> {
        if config.tag_length == 0 {
            return Err(LibraryError::Integrity(
                "tag length must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            config,
            codec: AddressCodec::new(config.address)?,
            paths: BTreeMap::new(),
            variants: BTreeMap::new(),
            loci: HashMap::new(),
            chromosome_loci: HashMap::new(),
            genome_variants: HashMap::new(),
            translations: HashMap::new(),
            spanning_statistics: HashMap::new(),
        })
    }

    /// Load a library from a JSON file, gzip-compressed if it ends in `.gz`
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::ReadError` if the file cannot be read, or any
    /// parse or integrity error from [`from_json`](Self::from_json).
    pub fn load_from_file(path: &Path) -> Result<Self, LibraryError> {
        let content = if is_gzip_path(path) {
            let file = std::fs::File::open(path)?;
            let mut content = String::new();
            GzDecoder::new(file).read_to_string(&mut content)?;
            content
        } else {
            std::fs::read_to_string(path)?
        };

        Self::from_json(&content)
    }

    /// Parse a library from JSON and rebuild its indexes
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::ParseError` for invalid JSON and
    /// `LibraryError::Integrity` or `LibraryError::Address` for inconsistent data.
    pub fn from_json(json: &str) -> Result<Self, LibraryError> {
        let data: LibraryData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != LIBRARY_VERSION {
            warn!(
                expected = LIBRARY_VERSION,
                found = %data.version,
                "Library version mismatch"
            );
        }

        let mut library = Self::new(LibraryConfig {
            tag_length: data.tag_length,
            address: data.address,
            path_version: data.path_version,
        })?;

        for path in data.paths {
            library.add_path(path)?;
        }
        for variant in data.tile_variants {
            library.add_tile_variant(variant)?;
        }
        for locus in data.loci {
            library.add_locus(locus)?;
        }
        for variant in data.genome_variants {
            library.add_genome_variant(variant)?;
        }
        for translation in data.translations {
            library.add_translation(translation)?;
        }
        for statistic in data.spanning_statistics {
            library.set_spanning_statistic(statistic);
        }

        library.check_tag_overlaps()?;

        debug!(
            variants = library.variants.len(),
            loci = library.loci.len(),
            paths = library.paths.len(),
            "Loaded tile library"
        );

        Ok(library)
    }

    /// Export library to JSON
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::ParseError` if serialization fails.
    pub fn to_json(&self) -> Result<String, LibraryError> {
        let mut loci: Vec<LocusAnnotation> = self.loci.values().cloned().collect();
        loci.sort_by(|a, b| {
            (&a.assembly, a.position, a.begin).cmp(&(&b.assembly, b.position, b.begin))
        });

        let mut genome_variants: Vec<GenomeVariant> =
            self.genome_variants.values().cloned().collect();
        genome_variants.sort_by_key(|v| v.id);

        let mut translations: Vec<Translation> =
            self.translations.values().flatten().cloned().collect();
        translations.sort_by_key(|t| (t.tile_variant, t.genome_variant));

        let mut spanning_statistics: Vec<SpanningStatistic> = self
            .spanning_statistics
            .iter()
            .map(|(&path, &max)| SpanningStatistic {
                path,
                max_num_positions_spanned: max,
            })
            .collect();
        spanning_statistics.sort_by_key(|s| s.path);

        let data = LibraryData {
            version: LIBRARY_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            tag_length: self.config.tag_length,
            address: self.config.address,
            path_version: self.config.path_version,
            paths: self.paths.values().cloned().collect(),
            tile_variants: self.variants.values().cloned().collect(),
            loci,
            genome_variants,
            translations,
            spanning_statistics,
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Write the library as JSON, gzip-compressed if `path` ends in `.gz`
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::ReadError` if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<(), LibraryError> {
        let json = self.to_json()?;
        if is_gzip_path(path) {
            let mut encoder = GzEncoder::new(std::fs::File::create(path)?, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn check_version(&self, position: TilePosition) -> Result<(), LibraryError> {
        if position.version != self.config.path_version {
            return Err(LibraryError::Integrity(format!(
                "position {position} has version {} but the library holds version {}",
                position.version, self.config.path_version
            )));
        }
        Ok(())
    }

    fn check_step(&self, position: TilePosition) -> Result<(), LibraryError> {
        if let Some(info) = self.paths.get(&position.path) {
            if position.step >= info.num_steps {
                return Err(LibraryError::Integrity(format!(
                    "position {position} is beyond the {} steps of path {:#x}",
                    info.num_steps, position.path
                )));
            }
        }
        Ok(())
    }

    /// Add an entry to the path-length table
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Integrity` if the path is already present, or
    /// `LibraryError::Address` if it does not fit the path width.
    pub fn add_path(&mut self, info: PathInfo) -> Result<(), LibraryError> {
        self.codec
            .path_bounds(self.config.path_version, info.path)?;
        if self.paths.contains_key(&info.path) {
            return Err(LibraryError::Integrity(format!(
                "path {:#x} is listed twice",
                info.path
            )));
        }
        self.paths.insert(info.path, info);
        Ok(())
    }

    /// Add a tile variant, checking its length and checksum
    ///
    /// A missing checksum is computed; a present one must match.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Integrity` for duplicates, length or checksum
    /// mismatches, non-nucleotide bases, or positions outside their path.
    pub fn add_tile_variant(&mut self, mut variant: TileVariant) -> Result<(), LibraryError> {
        let key = self.codec.encode_variant(variant.id)?;
        self.check_version(variant.id.position)?;
        self.check_step(variant.id.position)?;
        self.check_step(variant.last_position())?;

        if self.variants.contains_key(&key) {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} is defined twice",
                variant.id
            )));
        }
        if variant.num_positions_spanned == 0 {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} spans zero positions",
                variant.id
            )));
        }
        if !is_valid_sequence(&variant.sequence) {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} has non-nucleotide bases",
                variant.id
            )));
        }
        if variant.length != variant.sequence.len() {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} declares length {} but has {} bases",
                variant.id,
                variant.length,
                variant.sequence.len()
            )));
        }

        if let Some((side, stored, bases)) = variant.conflicting_tag(self.config.tag_length) {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} stores {side} tag {stored} but its bases carry {bases}",
                variant.id
            )));
        }

        let computed = compute_md5(&variant.sequence);
        if variant.md5.is_empty() {
            variant.md5 = computed;
        } else if normalize_md5(&variant.md5).as_deref() != Some(computed.as_str()) {
            return Err(LibraryError::Integrity(format!(
                "tile variant {} has checksum {} but its bases hash to {computed}",
                variant.id, variant.md5
            )));
        }

        self.variants.insert(key, variant);
        Ok(())
    }

    /// Add a locus annotation
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Integrity` for empty intervals, duplicates, or
    /// positions outside their path.
    pub fn add_locus(&mut self, locus: LocusAnnotation) -> Result<(), LibraryError> {
        self.codec.encode_position(locus.position)?;
        self.check_version(locus.position)?;
        self.check_step(locus.position)?;

        if locus.begin >= locus.end {
            return Err(LibraryError::Integrity(format!(
                "locus of {} in {} is empty: [{}, {})",
                locus.position, locus.assembly, locus.begin, locus.end
            )));
        }
        let key = (locus.assembly.clone(), locus.position);
        if self.loci.contains_key(&key) {
            return Err(LibraryError::Integrity(format!(
                "position {} has two loci in {}",
                locus.position, locus.assembly
            )));
        }

        let chromosome = self
            .chromosome_loci
            .entry((locus.assembly.clone(), locus.chromosome.clone()))
            .or_default();
        chromosome
            .by_begin
            .insert((locus.begin, locus.position), locus.end);
        chromosome.max_len = chromosome.max_len.max(locus.len());

        self.loci.insert(key, locus);
        Ok(())
    }

    /// Add a genome variant
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Integrity` for duplicates or inverted intervals.
    pub fn add_genome_variant(&mut self, variant: GenomeVariant) -> Result<(), LibraryError> {
        if variant.start > variant.end {
            return Err(LibraryError::Integrity(format!(
                "genome variant {} has start {} after end {}",
                variant.id, variant.start, variant.end
            )));
        }
        if self.genome_variants.contains_key(&variant.id) {
            return Err(LibraryError::Integrity(format!(
                "genome variant {} is defined twice",
                variant.id
            )));
        }
        self.genome_variants.insert(variant.id, variant);
        Ok(())
    }

    /// Add a translation between a genome variant and a tile variant
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Integrity` if either side is unknown or the
    /// offsets fall outside the tile variant.
    pub fn add_translation(&mut self, translation: Translation) -> Result<(), LibraryError> {
        if !self.genome_variants.contains_key(&translation.genome_variant) {
            return Err(LibraryError::Integrity(format!(
                "translation refers to unknown genome variant {}",
                translation.genome_variant
            )));
        }
        let Some(tile) = self.tile_variant(translation.tile_variant) else {
            return Err(LibraryError::Integrity(format!(
                "translation refers to unknown tile variant {}",
                translation.tile_variant
            )));
        };
        if translation.start > translation.end || translation.end > tile.length {
            return Err(LibraryError::Integrity(format!(
                "translation [{}, {}) does not fit tile variant {} of length {}",
                translation.start, translation.end, tile.id, tile.length
            )));
        }
        let entry = self.translations.entry(translation.tile_variant).or_default();
        entry.push(translation);
        entry.sort_by_key(|t| t.start);
        Ok(())
    }

    /// Replace the cached spanning statistic of a path
    pub fn set_spanning_statistic(&mut self, statistic: SpanningStatistic) {
        self.spanning_statistics
            .insert(statistic.path, statistic.max_num_positions_spanned);
    }

    /// Largest span of any variant stored in a path, by scanning the path
    ///
    /// A path without variants reports a span of 1.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::FieldOverflow` if `path` does not fit the path width.
    pub fn scan_max_span(&self, path: u32) -> Result<u32, AddressError> {
        Ok(self
            .variants_in_path(path)?
            .map(|v| v.num_positions_spanned)
            .max()
            .unwrap_or(1))
    }

    /// Rescan every populated path and replace the cached statistics
    ///
    /// Returns the fresh statistics in path order.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Address` if a stored path cannot be addressed.
    pub fn recompute_spanning_statistics(&mut self) -> Result<Vec<SpanningStatistic>, LibraryError> {
        let mut fresh = Vec::new();
        for path in self.populated_paths() {
            let statistic = SpanningStatistic {
                path,
                max_num_positions_spanned: self.scan_max_span(path)?,
            };
            if self.cached_max_span(path) != Some(statistic.max_num_positions_spanned) {
                debug!(
                    path = format_args!("{path:#x}"),
                    max = statistic.max_num_positions_spanned,
                    "Updated spanning statistic"
                );
            }
            fresh.push(statistic);
        }
        self.spanning_statistics.clear();
        for statistic in &fresh {
            self.set_spanning_statistic(*statistic);
        }
        Ok(fresh)
    }

    /// Adjacent loci of a path must share exactly one tag
    fn check_tag_overlaps(&self) -> Result<(), LibraryError> {
        let tag = self.config.tag_length as u64;
        for ((assembly, position), locus) in &self.loci {
            let Some(next) = position.step_forward(1) else {
                continue;
            };
            if let Some(next_locus) = self.loci.get(&(assembly.clone(), next)) {
                if next_locus.begin + tag != locus.end {
                    return Err(LibraryError::Integrity(format!(
                        "loci of {position} [{}, {}) and {next} [{}, {}) in {assembly} do not overlap by {tag} bases",
                        locus.begin, locus.end, next_locus.begin, next_locus.end
                    )));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    #[must_use]
    pub fn tag_length(&self) -> usize {
        self.config.tag_length
    }

    #[must_use]
    pub fn path_version(&self) -> u32 {
        self.config.path_version
    }

    /// Get a tile variant by id
    #[must_use]
    pub fn tile_variant(&self, id: TileVariantId) -> Option<&TileVariant> {
        let key = self.codec.encode_variant(id).ok()?;
        self.variants.get(&key)
    }

    /// All variants stored at one position, reference first
    pub fn variants_at(
        &self,
        position: TilePosition,
    ) -> Result<impl Iterator<Item = &TileVariant>, AddressError> {
        let encoded = self.codec.encode_position(position)?;
        let first = self.codec.variant_for(encoded, 0)?;
        let last = first | AddressConfig::max_value(self.config.address.variant_digits);
        Ok(self.variants.range(first..=last).map(|(_, v)| v))
    }

    /// All variants of a path in position order
    pub fn variants_in_path(
        &self,
        path: u32,
    ) -> Result<impl DoubleEndedIterator<Item = &TileVariant>, AddressError> {
        let (first, last) = self.codec.path_bounds(self.config.path_version, path)?;
        let first = self.codec.variant_for(first, 0)?;
        let last = self.codec.variant_for(last, 0)?
            | AddressConfig::max_value(self.config.address.variant_digits);
        Ok(self.variants.range(first..=last).map(|(_, v)| v))
    }

    #[must_use]
    pub fn locus(&self, assembly: &Assembly, position: TilePosition) -> Option<&LocusAnnotation> {
        self.loci.get(&(assembly.clone(), position))
    }

    pub(crate) fn loci_on(
        &self,
        assembly: &Assembly,
        chromosome: &Chromosome,
    ) -> Option<&ChromosomeLoci> {
        self.chromosome_loci
            .get(&(assembly.clone(), chromosome.clone()))
    }

    #[must_use]
    pub fn genome_variant(&self, id: GenomeVariantId) -> Option<&GenomeVariant> {
        self.genome_variants.get(&id)
    }

    /// Translations recorded on a tile variant, ordered by start offset
    #[must_use]
    pub fn translations_for(&self, tile_variant: TileVariantId) -> &[Translation] {
        self.translations
            .get(&tile_variant)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn cached_max_span(&self, path: u32) -> Option<u32> {
        self.spanning_statistics.get(&path).copied()
    }

    #[must_use]
    pub fn path_info(&self, path: u32) -> Option<&PathInfo> {
        self.paths.get(&path)
    }

    /// Paths of the path-length table in order
    pub fn paths(&self) -> impl Iterator<Item = &PathInfo> {
        self.paths.values()
    }

    /// Distinct paths that hold at least one tile variant
    #[must_use]
    pub fn populated_paths(&self) -> Vec<u32> {
        let mut paths: Vec<u32> = self.variants.values().map(|v| v.id.position.path).collect();
        paths.dedup();
        paths
    }

    /// Assemblies with at least one locus
    #[must_use]
    pub fn assemblies(&self) -> Vec<Assembly> {
        let mut assemblies: Vec<Assembly> =
            self.chromosome_loci.keys().map(|(a, _)| a.clone()).collect();
        assemblies.sort();
        assemblies.dedup();
        assemblies
    }

    /// Number of tile variants in library
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Check if library is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    #[must_use]
    pub fn num_loci(&self) -> usize {
        self.loci.len()
    }

    #[must_use]
    pub fn num_genome_variants(&self) -> usize {
        self.genome_variants.len()
    }
}
