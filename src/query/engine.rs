//! Population queries over a tile library and a call provider.
//!
//! A query runs as one synchronous pipeline: resolve the locus range to tile
//! positions, fetch every sample's calls over those positions, translate each
//! distinct call once, then stitch each haplotype. The first failure ends the
//! query; partial results are never returned.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::address::TilePosition;
use crate::core::token::Call;
use crate::core::types::{Assembly, Chromosome, Indexing, Phase, SampleId};
use crate::library::{IndexError, LocusIndex, StatisticsFallback, TileLibrary};
use crate::provider::{fetch_calls, CallProvider, PopulationCalls, ProviderError};
use crate::query::assembler::{
    AroundOutcome, AroundSequence, AssemblyConfig, AssemblyError, CallWalker, GapPolicy,
    Haplotype, SequenceAssembler,
};
use crate::query::resolver::{RangeResolver, ResolveError, ResolvedRange};
use crate::query::translator::{TranslateError, TranslationTable, VariantTranslator, Window};
use crate::utils::validation::{
    to_half_open, to_zero_based, validate_number_around, RangeError,
};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Unknown sample: {0}")]
    UnknownSample(SampleId),
}

impl QueryError {
    /// Whether the request itself was at fault, as opposed to the data or a provider
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Range(_) | Self::UnknownSample(_) => true,
            Self::Resolve(e) => !matches!(e, ResolveError::Index(_)),
            Self::Translate(_) | Self::Assembly(_) | Self::Provider(_) | Self::Index(_) => false,
        }
    }
}

/// Settings shared by every query an engine runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub assembly: AssemblyConfig,
    pub statistics: StatisticsFallback,
}

/// Whole-range query: both haplotypes of each sample over `[low, high)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub assembly: Assembly,
    pub chromosome: Chromosome,
    pub low: u64,
    /// Exclusive with 0-based indexing, inclusive with 1-based indexing
    pub high: u64,
    #[serde(default)]
    pub indexing: Indexing,
    /// Assembly of the loci to answer in, when it differs from `assembly`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liftover_to: Option<Assembly>,
    /// Samples to assemble; every sample of the provider when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<SampleId>>,
}

impl RangeQuery {
    pub fn new(assembly: Assembly, chromosome: Chromosome, low: u64, high: u64) -> Self {
        Self {
            assembly,
            chromosome,
            low,
            high,
            indexing: Indexing::default(),
            liftover_to: None,
            samples: None,
        }
    }
}

/// Around-target query: `number_around` bases on each side of `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AroundQuery {
    pub assembly: Assembly,
    pub chromosome: Chromosome,
    pub target: u64,
    pub number_around: u64,
    #[serde(default)]
    pub indexing: Indexing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<SampleId>>,
}

impl AroundQuery {
    pub fn new(assembly: Assembly, chromosome: Chromosome, target: u64, number_around: u64) -> Self {
        Self {
            assembly,
            chromosome,
            target,
            number_around,
            indexing: Indexing::default(),
            samples: None,
        }
    }
}

/// Calls and translations of an around-target query, grown as it extends
struct AroundWindow<'a> {
    translator: VariantTranslator<'a>,
    target: u64,
    with_gaps: bool,
    population: PopulationCalls,
    table: TranslationTable<Window>,
}

impl AroundWindow<'_> {
    fn add(&mut self, fetched: PopulationCalls) -> Result<(), TranslateError> {
        self.translator.translate_window(
            fetched.values().flatten().flatten(),
            self.target,
            self.with_gaps,
            &mut self.table,
        )?;

        for (sample, phases) in fetched {
            let existing = self.population.entry(sample).or_default();
            for (list, calls) in existing.iter_mut().zip(phases) {
                for call in calls {
                    if !list.contains(&call) {
                        list.push(call);
                    }
                }
                list.sort_by_key(Call::position);
            }
        }
        Ok(())
    }
}

/// Fetch one more position for the whole population
fn extend<F>(
    walker: &mut CallWalker<F>,
    reached: &mut TilePosition,
    max_extension: usize,
    window: &mut AroundWindow<'_>,
) -> Result<(), QueryError>
where
    F: FnMut(TilePosition) -> Result<PopulationCalls, ProviderError>,
{
    let Some(fetched) = walker.next() else {
        return Err(AssemblyError::ExtensionLimit {
            direction: walker.direction(),
            position: *reached,
            max_extension,
        }
        .into());
    };
    let (position, calls) = fetched?;
    debug!(direction = %walker.direction(), position = %position, "Extending window");
    *reached = position;
    window.add(calls)?;
    Ok(())
}

/// Runs range and around-target queries against one library and provider
pub struct QueryEngine<'a, P: ?Sized> {
    library: &'a TileLibrary,
    provider: &'a P,
    config: QueryConfig,
}

impl<'a, P: CallProvider + ?Sized> QueryEngine<'a, P> {
    pub fn new(library: &'a TileLibrary, provider: &'a P, config: QueryConfig) -> Self {
        Self {
            library,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn index(&self) -> LocusIndex<'a> {
        LocusIndex::new(self.library).with_fallback(self.config.statistics)
    }

    fn assembler(&self) -> SequenceAssembler {
        SequenceAssembler::new(self.library.tag_length(), self.config.assembly)
    }

    fn with_gaps(&self) -> bool {
        self.config.assembly.gap_policy == GapPolicy::ReturnGapMarker
    }

    /// Every sample the provider knows
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Provider` if the provider fails.
    pub fn samples(&self) -> Result<BTreeSet<SampleId>, QueryError> {
        Ok(self.provider.list_samples()?)
    }

    fn select_samples(&self, requested: Option<&[SampleId]>) -> Result<BTreeSet<SampleId>, QueryError> {
        let available = self.samples()?;
        let Some(requested) = requested else {
            return Ok(available);
        };
        requested
            .iter()
            .map(|sample| {
                if available.contains(sample) {
                    Ok(sample.clone())
                } else {
                    Err(QueryError::UnknownSample(sample.clone()))
                }
            })
            .collect()
    }

    /// Tile positions covering the query range
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Range` for bad coordinates and `QueryError::Resolve`
    /// for ranges without loci or unsupported liftovers.
    pub fn resolve(&self, query: &RangeQuery) -> Result<ResolvedRange, QueryError> {
        let (low, high) = to_half_open(query.low, query.high, query.indexing)?;
        let to = query.liftover_to.as_ref().unwrap_or(&query.assembly);
        Ok(RangeResolver::new(self.index()).resolve_lifted(
            &query.assembly,
            to,
            &query.chromosome,
            low,
            high,
        )?)
    }

    /// Assemble both haplotypes of each sample over the query range
    ///
    /// Each sequence covers exactly the requested bases of that haplotype.
    ///
    /// # Errors
    ///
    /// Returns the first failure of any stage: resolution, the provider,
    /// translation, or stitching.
    pub fn sequences_in_range(
        &self,
        query: &RangeQuery,
    ) -> Result<BTreeMap<SampleId, [String; 2]>, QueryError> {
        let range = self.resolve(query)?;
        let samples = self.select_samples(query.samples.as_deref())?;
        let (first, last) = (range.first(), range.last());
        let population = fetch_calls(self.provider, &samples, range.low_position(), last)?;

        let translator = VariantTranslator::new(self.index(), range.assembly.clone());
        let assembler = self.assembler();
        let mut table = TranslationTable::default();
        let mut sequences = BTreeMap::new();

        for (sample, phases) in population {
            let mut assembled: [String; 2] = Default::default();
            for phase in Phase::BOTH {
                let calls: Vec<Call> = phases[phase.index()]
                    .iter()
                    .filter(|c| c.last_position() >= first && c.position() <= last)
                    .copied()
                    .collect();
                translator.translate_range(&calls, range.low, range.high, self.with_gaps(), &mut table)?;
                assembled[phase.index()] = assembler.assemble_range(
                    Haplotype {
                        sample: &sample,
                        phase,
                    },
                    &calls,
                    &table,
                )?;
            }
            sequences.insert(sample, assembled);
        }

        info!(
            chromosome = %range.chromosome,
            low = range.low,
            high = range.high,
            samples = sequences.len(),
            translations = table.len(),
            "Assembled range"
        );
        Ok(sequences)
    }

    /// Assemble `number_around` bases on each side of the target base
    ///
    /// When a haplotype's calls run out before the margin is filled (a
    /// deletion near the edge of the window, say), one more position is
    /// fetched for the whole population in that direction and assembly is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::ExtensionLimit` when the path ends or the
    /// extension limit is reached first, plus any error of
    /// [`sequences_in_range`](Self::sequences_in_range).
    pub fn sequences_around(
        &self,
        query: &AroundQuery,
    ) -> Result<BTreeMap<SampleId, [AroundSequence; 2]>, QueryError> {
        let margin = query.number_around;
        validate_number_around(margin)?;
        let number_around = usize::try_from(margin).map_err(|_| RangeError::TooManyAround(margin))?;
        let target = to_zero_based(query.target, query.indexing)?;

        let index = self.index();
        let range = RangeResolver::new(index).resolve(
            &query.assembly,
            &query.chromosome,
            target.saturating_sub(margin),
            target.saturating_add(margin).saturating_add(1),
        )?;
        let center = range
            .loci
            .iter()
            .rev()
            .find(|locus| locus.contains(target))
            .map(|locus| locus.position)
            .ok_or_else(|| ResolveError::LocusNotFound {
                assembly: query.assembly.clone(),
                chromosome: query.chromosome.clone(),
                low: target,
                high: target.saturating_add(1),
                nearest: index.nearest_bounds(&query.assembly, &query.chromosome),
            })?;

        let samples = self.select_samples(query.samples.as_deref())?;
        let mut window = AroundWindow {
            translator: VariantTranslator::new(index, query.assembly.clone()),
            target,
            with_gaps: self.with_gaps(),
            population: PopulationCalls::new(),
            table: TranslationTable::default(),
        };
        window.add(fetch_calls(
            self.provider,
            &samples,
            range.low_position(),
            range.last(),
        )?)?;

        let max_extension = self.config.assembly.max_extension;
        let bound = index.highest_position_in_path(range.last().path)?;
        let fetch_one = |position| fetch_calls(self.provider, &samples, position, position);
        let mut backward = CallWalker::backward(range.low_position(), max_extension, fetch_one);
        let mut forward = CallWalker::forward(range.last(), bound, max_extension, fetch_one);
        let mut earliest = range.low_position();
        let mut latest = range.last();

        let assembler = self.assembler();
        loop {
            let mut sequences = BTreeMap::new();
            let (mut short_backward, mut short_forward) = (false, false);
            for (sample, phases) in &window.population {
                let mut around: [AroundSequence; 2] = Default::default();
                for phase in Phase::BOTH {
                    let outcome = assembler.assemble_around(
                        Haplotype { sample, phase },
                        &phases[phase.index()],
                        &window.table,
                        center,
                        number_around,
                    )?;
                    match outcome {
                        AroundOutcome::Complete(sequence) => around[phase.index()] = sequence,
                        AroundOutcome::Short { backward, forward } => {
                            short_backward |= backward;
                            short_forward |= forward;
                        }
                    }
                }
                sequences.insert(sample.clone(), around);
            }

            if !short_backward && !short_forward {
                info!(
                    chromosome = %query.chromosome,
                    target,
                    number_around,
                    center = %center,
                    samples = sequences.len(),
                    "Assembled around target"
                );
                return Ok(sequences);
            }
            if short_backward {
                extend(&mut backward, &mut earliest, max_extension, &mut window)?;
            }
            if short_forward {
                extend(&mut forward, &mut latest, max_extension, &mut window)?;
            }
        }
    }
}
