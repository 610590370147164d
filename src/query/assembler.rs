//! Stitching per-tile base strings into haplotype sequences.
//!
//! Adjacent tiles share a tag of `tag_length` bases. Each new piece must
//! agree with the sequence built so far on the shared bases, which are then
//! kept once. Pieces clipped to the edge of a window can be shorter than a
//! tag, so one side only has to be a prefix (or suffix) of the other.
//! Bases must agree exactly, except those of gap-marker pieces, which match
//! anything and take the known base. An `N` stored in a tile is compared
//! like any other base.
//!
//! | Direction | Compared                                    | Kept from the new piece |
//! |-----------|---------------------------------------------|-------------------------|
//! | forward   | last tag of sequence, first tag of piece    | bases after the overlap |
//! | backward  | first tag of sequence, last tag of piece    | bases before the overlap |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::core::address::TilePosition;
use crate::core::token::Call;
use crate::core::types::{Phase, SampleId};
use crate::query::translator::{TranslationTable, Window};

/// Default number of positions an around-target query may fetch beyond its window
pub const DEFAULT_MAX_EXTENSION: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error(
        "Tag mismatch for {sample} phase {phase} at {position}: sequence has '{expected}', tile has '{found}'"
    )]
    TagMismatch {
        sample: SampleId,
        phase: Phase,
        position: TilePosition,
        expected: String,
        found: String,
    },

    #[error("{sample} phase {phase} is not well sequenced at {position}")]
    NotWellSequenced {
        sample: SampleId,
        phase: Phase,
        position: TilePosition,
    },

    #[error("Extending {direction} from {position} hit the limit of {max_extension} positions or the path boundary")]
    ExtensionLimit {
        direction: Direction,
        position: TilePosition,
        max_extension: usize,
    },

    #[error("No translation for call {call} of {sample} phase {phase}")]
    UnknownToken {
        sample: SampleId,
        phase: Phase,
        call: String,
    },

    #[error("{sample} phase {phase} has no call covering {position}")]
    NoCallAtCenter {
        sample: SampleId,
        phase: Phase,
        position: TilePosition,
    },
}

/// How not-well-sequenced calls are assembled
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Fail the request at the first not-well-sequenced call
    #[default]
    AbortOnGap,
    /// Emit `N` for the bases of the unsequenced position and continue
    ReturnGapMarker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub gap_policy: GapPolicy,
    /// Positions an around-target query may fetch beyond its window, per direction
    pub max_extension: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            gap_policy: GapPolicy::default(),
            max_extension: DEFAULT_MAX_EXTENSION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Backward,
    Forward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backward => write!(f, "backward"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

/// Bases of one haplotype around a target base
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AroundSequence {
    pub before: String,
    /// Empty when the haplotype deletes the target base
    pub center: String,
    pub after: String,
}

/// Result of an around-target assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AroundOutcome {
    Complete(AroundSequence),
    /// Not enough calls to fill the margin on one or both sides
    Short { backward: bool, forward: bool },
}

/// Which haplotype is being assembled, for error context
#[derive(Debug, Clone, Copy)]
pub struct Haplotype<'s> {
    pub sample: &'s SampleId,
    pub phase: Phase,
}

/// Bases assembled so far for one haplotype
///
/// Bases that came from not-well-sequenced calls are flagged. Only flagged
/// bases match anything when tags are compared; a flagged base is replaced
/// by the other side's base when that base is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Strand {
    bases: String,
    gaps: Vec<bool>,
}

impl Strand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A strand holding one piece
    #[must_use]
    pub fn from_piece(bases: &str, gap: bool) -> Self {
        Self {
            bases: bases.to_string(),
            gaps: vec![gap; bases.len()],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.bases
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.bases
    }

    /// Keep the last `len` bases
    fn keep_last(&mut self, len: usize) {
        let excess = self.len().saturating_sub(len);
        self.bases.drain(..excess);
        self.gaps.drain(..excess);
    }

    /// Keep the first `len` bases
    fn keep_first(&mut self, len: usize) {
        self.bases.truncate(len);
        self.gaps.truncate(len);
    }

    /// Whether `piece` agrees with the bases starting at `start`
    fn agrees(&self, start: usize, piece: &str, gap: bool) -> bool {
        gap || self.bases.as_bytes()[start..start + piece.len()]
            .iter()
            .zip(&self.gaps[start..])
            .zip(piece.bytes())
            .all(|((known, flagged), new)| *known == new || *flagged)
    }

    /// Replace flagged bases starting at `start` with the known bases of `piece`
    fn fill(&mut self, start: usize, piece: &str, gap: bool) {
        if gap || !self.gaps[start..start + piece.len()].contains(&true) {
            return;
        }
        let filled: String = self.bases[start..start + piece.len()]
            .chars()
            .zip(piece.chars())
            .zip(&self.gaps[start..])
            .map(|((known, new), flagged)| if *flagged { new } else { known })
            .collect();
        self.bases.replace_range(start..start + piece.len(), &filled);
        for flagged in &mut self.gaps[start..start + piece.len()] {
            *flagged = false;
        }
    }

    fn push(&mut self, bases: &str, gap: bool) {
        self.bases.push_str(bases);
        self.gaps.resize(self.gaps.len() + bases.len(), gap);
    }

    fn push_front(&mut self, bases: &str, gap: bool) {
        self.bases.insert_str(0, bases);
        let mut gaps = vec![gap; bases.len()];
        gaps.append(&mut self.gaps);
        self.gaps = gaps;
    }
}

/// Stitches translated calls of one haplotype
#[derive(Debug, Clone, Copy)]
pub struct SequenceAssembler {
    tag_length: usize,
    config: AssemblyConfig,
}

impl SequenceAssembler {
    #[must_use]
    pub fn new(tag_length: usize, config: AssemblyConfig) -> Self {
        Self { tag_length, config }
    }

    #[must_use]
    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    fn tag_mismatch(
        haplotype: Haplotype<'_>,
        position: TilePosition,
        expected: &str,
        found: &str,
    ) -> AssemblyError {
        error!(
            sample = %haplotype.sample,
            phase = %haplotype.phase,
            position = %position,
            expected,
            found,
            "Tag mismatch while assembling"
        );
        AssemblyError::TagMismatch {
            sample: haplotype.sample.clone(),
            phase: haplotype.phase,
            position,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Append `piece` to `strand`, keeping the shared tag once
    ///
    /// `gap` marks a piece made for a not-well-sequenced call; its bases
    /// match anything. All other bases must agree exactly.
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::TagMismatch` if the shared bases disagree.
    pub fn append(
        &self,
        haplotype: Haplotype<'_>,
        position: TilePosition,
        strand: &mut Strand,
        piece: &str,
        gap: bool,
    ) -> Result<(), AssemblyError> {
        if piece.is_empty() {
            return Ok(());
        }
        if strand.is_empty() {
            strand.push(piece, gap);
            return Ok(());
        }

        let tail_start = strand.len() - self.tag_length.min(strand.len());
        let tail_len = strand.len() - tail_start;
        let head = &piece[..self.tag_length.min(piece.len())];
        let overlap = if head.len() >= tail_len && strand.agrees(tail_start, &head[..tail_len], gap) {
            tail_len
        } else if head.len() < tail_len && strand.agrees(strand.len() - head.len(), head, gap) {
            head.len()
        } else {
            return Err(Self::tag_mismatch(
                haplotype,
                position,
                &strand.as_str()[tail_start..],
                head,
            ));
        };

        let start = strand.len() - overlap;
        strand.fill(start, &piece[..overlap], gap);
        strand.push(&piece[overlap..], gap);
        Ok(())
    }

    /// Prepend `piece` to `strand`, keeping the shared tag once
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::TagMismatch` if the shared bases disagree.
    pub fn prepend(
        &self,
        haplotype: Haplotype<'_>,
        position: TilePosition,
        strand: &mut Strand,
        piece: &str,
        gap: bool,
    ) -> Result<(), AssemblyError> {
        if piece.is_empty() {
            return Ok(());
        }
        if strand.is_empty() {
            strand.push(piece, gap);
            return Ok(());
        }

        let head_len = self.tag_length.min(strand.len());
        let tail = &piece[piece.len() - self.tag_length.min(piece.len())..];
        let overlap = if tail.len() >= head_len && strand.agrees(0, &tail[tail.len() - head_len..], gap) {
            head_len
        } else if tail.len() < head_len && strand.agrees(0, tail, gap) {
            tail.len()
        } else {
            return Err(Self::tag_mismatch(
                haplotype,
                position,
                &strand.as_str()[..head_len],
                tail,
            ));
        };

        let keep = piece.len() - overlap;
        strand.fill(0, &piece[keep..], gap);
        strand.push_front(&piece[..keep], gap);
        Ok(())
    }

    /// Translation of one call, applying the gap policy
    fn lookup<'t, T>(
        &self,
        haplotype: Haplotype<'_>,
        call: &Call,
        table: &'t TranslationTable<T>,
    ) -> Result<&'t T, AssemblyError> {
        if let Call::NotWellSequenced(position) = call {
            if self.config.gap_policy == GapPolicy::AbortOnGap {
                warn!(
                    sample = %haplotype.sample,
                    phase = %haplotype.phase,
                    position = %position,
                    "Aborting on not-well-sequenced call"
                );
                return Err(AssemblyError::NotWellSequenced {
                    sample: haplotype.sample.clone(),
                    phase: haplotype.phase,
                    position: *position,
                });
            }
        }
        table.get(call).ok_or_else(|| AssemblyError::UnknownToken {
            sample: haplotype.sample.clone(),
            phase: haplotype.phase,
            call: call.to_string(),
        })
    }

    /// Assemble a whole-range query from calls in position order
    ///
    /// Translations are already clipped to the requested range, so the
    /// result covers exactly that range.
    ///
    /// # Errors
    ///
    /// Returns the first tag mismatch, gap under `AbortOnGap`, or call
    /// without a translation.
    pub fn assemble_range(
        &self,
        haplotype: Haplotype<'_>,
        calls: &[Call],
        table: &TranslationTable<String>,
    ) -> Result<String, AssemblyError> {
        let mut strand = Strand::new();
        for call in calls {
            let piece = self.lookup(haplotype, call, table)?;
            self.append(haplotype, call.position(), &mut strand, piece, call.is_gap())?;
        }
        Ok(strand.into_string())
    }

    /// Assemble `number_around` bases on each side of the target base
    ///
    /// `center` is the position whose locus holds the target. Returns
    /// [`AroundOutcome::Short`] when the calls run out before the margin is
    /// filled, so the caller can fetch one more position and retry.
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::NoCallAtCenter` if no call covers `center`,
    /// plus any error of [`assemble_range`](Self::assemble_range).
    pub fn assemble_around(
        &self,
        haplotype: Haplotype<'_>,
        calls: &[Call],
        table: &TranslationTable<Window>,
        center: TilePosition,
        number_around: usize,
    ) -> Result<AroundOutcome, AssemblyError> {
        let index = calls
            .iter()
            .position(|c| c.covers(center))
            .ok_or_else(|| AssemblyError::NoCallAtCenter {
                sample: haplotype.sample.clone(),
                phase: haplotype.phase,
                position: center,
            })?;

        let center_call = &calls[index];
        let gap = center_call.is_gap();
        let (mut before, middle, mut after) = match self.lookup(haplotype, center_call, table)? {
            Window::AtCenter {
                left,
                center,
                right,
            } => (
                Strand::from_piece(left, gap),
                center.clone(),
                Strand::from_piece(right, gap),
            ),
            other => (
                Strand::from_piece(other.leading(), gap),
                String::new(),
                Strand::from_piece(other.trailing(), gap),
            ),
        };

        for call in calls[..index].iter().rev() {
            let window = self.lookup(haplotype, call, table)?;
            self.prepend(haplotype, call.position(), &mut before, window.leading(), call.is_gap())?;
        }
        for call in &calls[index + 1..] {
            let window = self.lookup(haplotype, call, table)?;
            self.append(haplotype, call.position(), &mut after, window.trailing(), call.is_gap())?;
        }

        let backward = before.len() < number_around;
        let forward = after.len() < number_around;
        if backward || forward {
            return Ok(AroundOutcome::Short { backward, forward });
        }

        before.keep_last(number_around);
        after.keep_first(number_around);
        Ok(AroundOutcome::Complete(AroundSequence {
            before: before.into_string(),
            center: middle,
            after: after.into_string(),
        }))
    }
}

/// Lazily fetches one position at a time beyond a window
///
/// Stops at the path boundary, at `bound` for forward walks, and after
/// `max_extension` positions.
pub struct CallWalker<F> {
    next: Option<TilePosition>,
    direction: Direction,
    remaining: usize,
    bound: Option<TilePosition>,
    fetch: F,
}

impl<F> CallWalker<F> {
    /// Walk backwards starting just before `from`
    pub fn backward(from: TilePosition, max_extension: usize, fetch: F) -> Self {
        Self {
            next: from.step_back(1),
            direction: Direction::Backward,
            remaining: max_extension,
            bound: None,
            fetch,
        }
    }

    /// Walk forwards starting just after `from`, never past `bound`
    pub fn forward(from: TilePosition, bound: TilePosition, max_extension: usize, fetch: F) -> Self {
        Self {
            next: from.step_forward(1),
            direction: Direction::Forward,
            remaining: max_extension,
            bound: Some(bound),
            fetch,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl<T, E, F> Iterator for CallWalker<F>
where
    F: FnMut(TilePosition) -> Result<T, E>,
{
    type Item = Result<(TilePosition, T), E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let position = self.next?;
        if self.bound.is_some_and(|bound| position > bound) {
            return None;
        }

        self.remaining -= 1;
        self.next = match self.direction {
            Direction::Backward => position.step_back(1),
            Direction::Forward => position.step_forward(1),
        };
        Some((self.fetch)(position).map(|fetched| (position, fetched)))
    }
}
