use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::address::{AddressConfig, TilePosition};
use crate::core::token::Call;
use crate::core::types::{Phase, SampleId};
use crate::parsing::calls::{parse_calls_file, ParseError};

use super::{CallProvider, PhasedCalls, PopulationCalls, ProviderError};

/// Call provider backed by calls held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCallProvider {
    calls: BTreeMap<SampleId, PhasedCalls>,
}

impl InMemoryCallProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a call-set file
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the file cannot be read or parsed.
    pub fn from_file(path: &Path, address: &AddressConfig) -> Result<Self, ParseError> {
        Ok(Self {
            calls: parse_calls_file(path, address)?,
        })
    }

    /// Add calls for one haplotype, keeping them in position order
    pub fn insert(&mut self, sample: SampleId, phase: Phase, calls: impl IntoIterator<Item = Call>) {
        let phased = self.calls.entry(sample).or_default();
        let list = &mut phased[phase.index()];
        list.extend(calls);
        list.sort_by_key(Call::position);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl From<BTreeMap<SampleId, PhasedCalls>> for InMemoryCallProvider {
    fn from(calls: BTreeMap<SampleId, PhasedCalls>) -> Self {
        Self { calls }
    }
}

impl CallProvider for InMemoryCallProvider {
    fn list_samples(&self) -> Result<BTreeSet<SampleId>, ProviderError> {
        Ok(self.calls.keys().cloned().collect())
    }

    fn calls_for_range(
        &self,
        samples: &BTreeSet<SampleId>,
        low: TilePosition,
        high: TilePosition,
    ) -> Result<PopulationCalls, ProviderError> {
        let touches = |call: &&Call| call.last_position() >= low && call.position() <= high;
        Ok(samples
            .iter()
            .filter_map(|sample| {
                let phased = self.calls.get(sample)?;
                let [a, b] = phased;
                Some((
                    sample.clone(),
                    [
                        a.iter().filter(touches).copied().collect(),
                        b.iter().filter(touches).copied().collect(),
                    ],
                ))
            })
            .collect())
    }
}
