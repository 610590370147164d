use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::address::{AddressConfig, AddressError};
use crate::core::token::Call;
use crate::core::types::{Phase, SampleId};
use crate::provider::PhasedCalls;
use crate::utils::validation::MAX_SAMPLES;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid call-set format: {0}")]
    InvalidFormat(String),

    #[error("Line {line}: {source}")]
    Token {
        line: usize,
        #[source]
        source: AddressError,
    },

    #[error("Too many samples: more than {MAX_SAMPLES}")]
    TooManySamples,
}

fn parse_phase(field: &str) -> Option<Phase> {
    match field {
        "A" | "a" | "0" => Some(Phase::A),
        "B" | "b" | "1" => Some(Phase::B),
        _ => None,
    }
}

/// Parse a call-set file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or any error of
/// [`parse_calls_text`].
pub fn parse_calls_file(
    path: &Path,
    address: &AddressConfig,
) -> Result<BTreeMap<SampleId, PhasedCalls>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_calls_text(&content, address)
}

/// Parse tab-separated lines of `sample  phase  calls...`
///
/// Calls are whitespace-separated compact tokens or not-well-sequenced
/// sentinels. A haplotype may continue over several lines; its calls are
/// sorted by position.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for lines without a phase or with an
/// unknown phase, `ParseError::Token` for malformed tokens, and
/// `ParseError::TooManySamples` past the sample limit.
pub fn parse_calls_text(
    text: &str,
    address: &AddressConfig,
) -> Result<BTreeMap<SampleId, PhasedCalls>, ParseError> {
    let mut calls: BTreeMap<SampleId, PhasedCalls> = BTreeMap::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_num = i + 1;

        let mut fields = line.splitn(3, '\t');
        let sample = fields.next().unwrap_or_default().trim();
        let phase_field = fields.next().map(str::trim).ok_or_else(|| {
            ParseError::InvalidFormat(format!("Line {line_num} has no phase column"))
        })?;

        if sample.eq_ignore_ascii_case("sample") && phase_field.eq_ignore_ascii_case("phase") {
            continue;
        }

        let phase = parse_phase(phase_field).ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "Invalid phase on line {line_num}: '{phase_field}' (expected A or B)"
            ))
        })?;

        let sample = SampleId::new(sample);
        if !calls.contains_key(&sample) && calls.len() >= MAX_SAMPLES {
            return Err(ParseError::TooManySamples);
        }

        let list = &mut calls.entry(sample).or_default()[phase.index()];
        for token in fields.next().unwrap_or_default().split_whitespace() {
            let call = Call::parse(token, address).map_err(|source| ParseError::Token {
                line: line_num,
                source,
            })?;
            list.push(call);
        }
    }

    for phased in calls.values_mut() {
        for list in phased.iter_mut() {
            list.sort_by_key(Call::position);
        }
    }

    Ok(calls)
}
