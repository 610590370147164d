//! Sources of per-sample haplotype calls.
//!
//! A [`CallProvider`] reports, for each sample and phase, the ordered list of
//! tile variant calls over a range of positions. Providers own retries and
//! timeouts; any failure they report ends the current request.
//!
//! - [`memory::InMemoryCallProvider`]: calls held in memory, usually loaded
//!   from a call-set file
//! - [`http::HttpCallProvider`]: a remote call service spoken to over JSON

pub mod http;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::core::address::TilePosition;
use crate::core::token::Call;
use crate::core::types::{Phase, SampleId};

pub use http::{HttpCallProvider, HttpProviderConfig};
pub use memory::InMemoryCallProvider;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Call provider unreachable: {0}")]
    Transport(String),

    #[error("Call provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Call provider protocol error: {0}")]
    Protocol(String),
}

/// Calls of one sample, indexed by [`Phase::index`]
pub type PhasedCalls = [Vec<Call>; 2];

/// Calls of every requested sample
pub type PopulationCalls = BTreeMap<SampleId, PhasedCalls>;

pub trait CallProvider {
    /// Every sample the provider can report calls for
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if the provider cannot be reached.
    fn list_samples(&self) -> Result<BTreeSet<SampleId>, ProviderError>;

    /// Calls touching the inclusive position range `[low, high]`, in position order
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if the provider cannot be reached or answers
    /// with something that is not a call set.
    fn calls_for_range(
        &self,
        samples: &BTreeSet<SampleId>,
        low: TilePosition,
        high: TilePosition,
    ) -> Result<PopulationCalls, ProviderError>;
}

impl<P: CallProvider + ?Sized> CallProvider for &P {
    fn list_samples(&self) -> Result<BTreeSet<SampleId>, ProviderError> {
        (**self).list_samples()
    }

    fn calls_for_range(
        &self,
        samples: &BTreeSet<SampleId>,
        low: TilePosition,
        high: TilePosition,
    ) -> Result<PopulationCalls, ProviderError> {
        (**self).calls_for_range(samples, low, high)
    }
}

fn protocol_error(message: String) -> ProviderError {
    error!(%message, "Call provider protocol violation");
    ProviderError::Protocol(message)
}

/// First position of `[low, high]` no call covers, if any
///
/// `calls` must be in position order. A spanning call may start before `low`.
fn first_uncovered(calls: &[Call], low: TilePosition, high: TilePosition) -> Option<TilePosition> {
    let mut next = Some(low);
    for call in calls {
        let Some(expected) = next.filter(|p| *p <= high) else {
            break;
        };
        if call.last_position() < expected {
            continue;
        }
        if call.position() > expected {
            return Some(expected);
        }
        next = call.last_position().step_forward(1);
    }
    next.filter(|p| *p <= high)
}

/// Fetch calls and check the provider answered exactly what was asked
///
/// Every phase of every sample must cover each position of `[low, high]`;
/// unsequenced positions come back as not-well-sequenced calls, never as
/// holes.
///
/// # Errors
///
/// Returns `ProviderError::Protocol` if the returned samples differ from
/// `samples`, a phase lists calls out of position order, or a phase leaves a
/// position without a call. Passes any provider failure through.
pub fn fetch_calls<P: CallProvider + ?Sized>(
    provider: &P,
    samples: &BTreeSet<SampleId>,
    low: TilePosition,
    high: TilePosition,
) -> Result<PopulationCalls, ProviderError> {
    let calls = provider.calls_for_range(samples, low, high)?;

    let missing: Vec<&SampleId> = samples.iter().filter(|s| !calls.contains_key(*s)).collect();
    let unexpected: Vec<&SampleId> = calls.keys().filter(|s| !samples.contains(*s)).collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(protocol_error(format!(
            "sample set mismatch: missing [{}], unexpected [{}]",
            join(&missing),
            join(&unexpected)
        )));
    }

    for (sample, phases) in &calls {
        for phase in Phase::BOTH {
            let ordered = phases[phase.index()]
                .windows(2)
                .all(|w| w[0].position() <= w[1].position());
            if !ordered {
                return Err(protocol_error(format!(
                    "calls of {sample} phase {phase} are not in position order"
                )));
            }
            if let Some(position) = first_uncovered(&phases[phase.index()], low, high) {
                return Err(protocol_error(format!(
                    "calls of {sample} phase {phase} leave {position} uncovered"
                )));
            }
        }
    }

    Ok(calls)
}

fn join(samples: &[&SampleId]) -> String {
    samples
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::TileVariantId;
    use crate::core::token::Token;

    /// Answers with whatever it was built with, ignoring the request
    struct FixedProvider(PopulationCalls);

    impl CallProvider for FixedProvider {
        fn list_samples(&self) -> Result<BTreeSet<SampleId>, ProviderError> {
            Ok(self.0.keys().cloned().collect())
        }

        fn calls_for_range(
            &self,
            _samples: &BTreeSet<SampleId>,
            _low: TilePosition,
            _high: TilePosition,
        ) -> Result<PopulationCalls, ProviderError> {
            Ok(self.0.clone())
        }
    }

    fn call(step: u32) -> Call {
        Call::Tile(Token::new(TilePosition::new(0, 1, step).reference_variant(), 1))
    }

    fn samples(names: &[&str]) -> BTreeSet<SampleId> {
        names.iter().map(|n| SampleId::new(*n)).collect()
    }

    fn provider(names: &[&str]) -> FixedProvider {
        FixedProvider(
            names
                .iter()
                .map(|n| (SampleId::new(*n), [vec![call(0), call(1)], vec![call(0), call(1)]]))
                .collect(),
        )
    }

    #[test]
    fn test_matching_sample_set() {
        let low = TilePosition::new(0, 1, 0);
        let calls = fetch_calls(&provider(&["a", "b"]), &samples(&["a", "b"]), low, low).unwrap();
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_sample_set_mismatch_is_protocol_error() {
        let low = TilePosition::new(0, 1, 0);
        let err = fetch_calls(&provider(&["a", "c"]), &samples(&["a", "b"]), low, low).unwrap_err();
        match err {
            ProviderError::Protocol(message) => {
                assert!(message.contains("missing [b]"));
                assert!(message.contains("unexpected [c]"));
            }
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_trailing_call_rejected() {
        let (low, high) = (TilePosition::new(0, 1, 0), TilePosition::new(0, 1, 1));
        let mut calls = PopulationCalls::new();
        calls.insert(SampleId::new("a"), [vec![call(0)], vec![call(0), call(1)]]);
        let err = fetch_calls(&FixedProvider(calls), &samples(&["a"]), low, high).unwrap_err();
        match err {
            ProviderError::Protocol(message) => {
                assert!(message.contains("phase A leave 001.00.0001 uncovered"));
            }
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_hole_rejected() {
        let (low, high) = (TilePosition::new(0, 1, 0), TilePosition::new(0, 1, 2));
        let mut calls = PopulationCalls::new();
        calls.insert(SampleId::new("a"), [vec![call(0), call(2)], vec![call(0), call(1), call(2)]]);
        assert!(matches!(
            fetch_calls(&FixedProvider(calls), &samples(&["a"]), low, high),
            Err(ProviderError::Protocol(_))
        ));
    }

    #[test]
    fn test_spanning_and_gap_calls_cover() {
        let (low, high) = (TilePosition::new(0, 1, 1), TilePosition::new(0, 1, 3));
        let spanning = Call::Tile(Token::new(
            TileVariantId::new(TilePosition::new(0, 1, 0), 1),
            2,
        ));
        let gap = Call::NotWellSequenced(TilePosition::new(0, 1, 2));
        let mut calls = PopulationCalls::new();
        calls.insert(
            SampleId::new("a"),
            [vec![spanning, gap, call(3)], vec![call(1), call(2), call(3)]],
        );
        assert!(fetch_calls(&FixedProvider(calls), &samples(&["a"]), low, high).is_ok());
    }

    #[test]
    fn test_unordered_calls_rejected() {
        let low = TilePosition::new(0, 1, 0);
        let mut calls = PopulationCalls::new();
        calls.insert(SampleId::new("a"), [vec![call(1), call(0)], Vec::new()]);
        let err = fetch_calls(&FixedProvider(calls), &samples(&["a"]), low, low).unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }
}
