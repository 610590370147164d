//! End-to-end query tests against the fixture library in `tests/data`.
//!
//! The fixture is one path (0x2c5) of four 50-base reference tiles on
//! chromosome 13, 26 bases apart, with a SNP variant at step 0 and a
//! variant spanning steps 1 and 2. Three samples are called against it.

use std::path::{Path, PathBuf};

use tile_library::core::address::{AddressConfig, AddressError, TilePosition, TileVariantId};
use tile_library::core::token::Call;
use tile_library::core::types::{Assembly, Chromosome, Indexing, SampleId};
use tile_library::core::variant::GenomeVariantId;
use tile_library::library::LocusIndex;
use tile_library::query::{
    AroundQuery, AssemblyConfig, AssemblyError, GapPolicy, QueryConfig, QueryEngine, QueryError,
    RangeQuery, RangeResolver, ResolveError, TranslateError, VariantTranslator,
};
use tile_library::{InMemoryCallProvider, TileLibrary};

/// Bases of chromosome 13 covered by the fixture
const CHROM: &str = "CGACGTTAGCGAAAGATCTCCGTGCATCATTACTTGGGGTTTACGCCATAAACTCAGCGTCGTCTCCATATCGTACTATAATCTCTAAAGTTTGGAGAGGACGGGCATGAGGTTAGCACAGCCCCACT";

const PATH: u32 = 0x2c5;

fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn load_library() -> TileLibrary {
    TileLibrary::load_from_file(&data_path("library.json")).unwrap()
}

fn load_provider(library: &TileLibrary) -> InMemoryCallProvider {
    InMemoryCallProvider::from_file(&data_path("calls.tsv"), &library.config().address).unwrap()
}

fn chr13() -> Chromosome {
    Chromosome::Autosome(13)
}

fn position(step: u32) -> TilePosition {
    TilePosition::new(0, PATH, step)
}

fn range_query(low: u64, high: u64, samples: &[&str]) -> RangeQuery {
    RangeQuery {
        samples: (!samples.is_empty()).then(|| samples.iter().map(|s| SampleId::new(*s)).collect()),
        ..RangeQuery::new(Assembly::Grch37, chr13(), low, high)
    }
}

fn with_snp(low: usize, high: usize, at: usize, base: &str) -> String {
    format!("{}{base}{}", &CHROM[low..at], &CHROM[at + 1..high])
}

#[test]
fn test_fixture_loads() {
    let library = load_library();
    assert_eq!(library.tag_length(), 24);
    assert_eq!(library.len(), 6);
    assert_eq!(library.num_loci(), 4);
    assert_eq!(library.num_genome_variants(), 2);
    assert_eq!(library.assemblies(), vec![Assembly::Grch37]);
    assert_eq!(library.cached_max_span(PATH), Some(2));
}

/// Two adjacent tiles sharing a 24-base tag assemble without repeating it
#[test]
fn test_range_across_tag_has_no_duplicated_bases() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let range = engine.resolve(&range_query(40, 60, &[])).unwrap();
    let steps: Vec<u32> = range.positions().map(|p| p.step).collect();
    assert_eq!(steps, vec![0, 1, 2]);

    let sequences = engine
        .sequences_in_range(&range_query(40, 60, &["hu001"]))
        .unwrap();
    let [a, b] = &sequences[&SampleId::new("hu001")];
    assert_eq!(a.len(), 20);
    assert_eq!(a, &CHROM[40..60]);
    assert_eq!(b, &CHROM[40..60]);
}

#[test]
fn test_range_with_snp() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let sequences = engine
        .sequences_in_range(&range_query(20, 30, &["hu001"]))
        .unwrap();
    let [a, b] = &sequences[&SampleId::new("hu001")];
    assert_eq!(a, &CHROM[20..30]);
    assert_eq!(b, &with_snp(20, 30, 24, "T"));

    let whole_tile = engine
        .sequences_in_range(&range_query(0, 50, &["hu001"]))
        .unwrap();
    assert_eq!(whole_tile[&SampleId::new("hu001")][1], with_snp(0, 50, 24, "T"));
}

#[test]
fn test_range_through_spanning_variant() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let sequences = engine
        .sequences_in_range(&range_query(40, 70, &["hu002"]))
        .unwrap();
    let [a, b] = &sequences[&SampleId::new("hu002")];
    assert_eq!(a, &CHROM[40..70]);
    assert_eq!(b, &with_snp(40, 70, 64, "A"));
}

/// A range starting inside the second spanned position still sees the variant
#[test]
fn test_range_starting_inside_spanning_variant() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let range = engine.resolve(&range_query(80, 100, &[])).unwrap();
    assert_eq!(range.first(), position(2));
    assert_eq!(range.spanning, vec![TileVariantId::new(position(1), 1)]);
    assert_eq!(range.low_position(), position(1));

    let sequences = engine
        .sequences_in_range(&range_query(80, 100, &["hu002"]))
        .unwrap();
    let [a, b] = &sequences[&SampleId::new("hu002")];
    assert_eq!(a, &CHROM[80..100]);
    assert_eq!(b, &CHROM[80..100]);
}

#[test]
fn test_one_based_query_matches_zero_based() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let zero = engine
        .sequences_in_range(&range_query(40, 70, &["hu001", "hu002"]))
        .unwrap();
    let one = engine
        .sequences_in_range(&RangeQuery {
            indexing: Indexing::One,
            ..range_query(41, 70, &["hu001", "hu002"])
        })
        .unwrap();
    assert_eq!(zero, one);
}

#[test]
fn test_gap_aborts_by_default() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let err = engine
        .sequences_in_range(&range_query(40, 60, &["hu003"]))
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Assembly(AssemblyError::NotWellSequenced { ref sample, position: p, .. })
            if sample.0 == "hu003" && p == position(1)
    ));
    assert!(!err.is_client_error());
}

#[test]
fn test_gap_marker_fills_known_bases() {
    let library = load_library();
    let provider = load_provider(&library);
    let config = QueryConfig {
        assembly: AssemblyConfig {
            gap_policy: GapPolicy::ReturnGapMarker,
            ..AssemblyConfig::default()
        },
        ..QueryConfig::default()
    };
    let engine = QueryEngine::new(&library, &provider, config);

    let sequences = engine.sequences_in_range(&range_query(40, 60, &[])).unwrap();
    assert_eq!(sequences.len(), 3);
    let [a, b] = &sequences[&SampleId::new("hu003")];
    assert_eq!(a, &CHROM[40..60]);
    // Only [50, 52) is covered by the unsequenced tile alone
    assert_eq!(b, &format!("{}NN{}", &CHROM[40..50], &CHROM[52..60]));
}

#[test]
fn test_around_target() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let query = AroundQuery {
        samples: Some(vec![SampleId::new("hu001"), SampleId::new("hu002")]),
        ..AroundQuery::new(Assembly::Grch37, chr13(), 64, 5)
    };
    let sequences = engine.sequences_around(&query).unwrap();

    let [reference, spanning] = &sequences[&SampleId::new("hu002")];
    assert_eq!(reference.before, &CHROM[59..64]);
    assert_eq!(reference.center, &CHROM[64..65]);
    assert_eq!(reference.after, &CHROM[65..70]);
    assert_eq!(spanning.before, &CHROM[59..64]);
    assert_eq!(spanning.center, "A");
    assert_eq!(spanning.after, &CHROM[65..70]);
}

#[test]
fn test_around_needs_positions_past_the_path() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    // 120 + 10 runs off the end of the last tile
    let query = AroundQuery {
        samples: Some(vec![SampleId::new("hu001")]),
        ..AroundQuery::new(Assembly::Grch37, chr13(), 120, 10)
    };
    let err = engine.sequences_around(&query).unwrap_err();
    assert!(matches!(
        err,
        QueryError::Assembly(AssemblyError::ExtensionLimit { .. })
    ));
}

#[test]
fn test_unknown_sample_is_client_error() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let err = engine
        .sequences_in_range(&range_query(40, 60, &["hu999"]))
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownSample(_)));
    assert!(err.is_client_error());
}

#[test]
fn test_range_outside_loaded_loci() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let err = engine
        .sequences_in_range(&range_query(1000, 1010, &["hu001"]))
        .unwrap_err();
    match err {
        QueryError::Resolve(ResolveError::LocusNotFound { nearest, .. }) => {
            assert_eq!(nearest, Some((0, 128)));
        }
        other => panic!("expected LocusNotFound, got {other:?}"),
    }
}

#[test]
fn test_liftover_is_refused() {
    let library = load_library();
    let provider = load_provider(&library);
    let engine = QueryEngine::new(&library, &provider, QueryConfig::default());

    let query = RangeQuery {
        liftover_to: Some(Assembly::Grch38),
        ..range_query(40, 60, &["hu001"])
    };
    let err = engine.sequences_in_range(&query).unwrap_err();
    assert!(matches!(
        err,
        QueryError::Resolve(ResolveError::UnsupportedLiftover { .. })
    ));
    assert!(err.is_client_error());
}

/// A SNP translation is checked against both the reference and the variant bases
#[test]
fn test_snp_translation() {
    let library = load_library();
    let translator = VariantTranslator::new(LocusIndex::new(&library), Assembly::Grch37);

    let snp = library.genome_variant(GenomeVariantId(1)).unwrap();
    let tile = library
        .tile_variant(TileVariantId::new(position(0), 1))
        .unwrap();
    assert_eq!(&CHROM[24..25], "C");
    assert_eq!(&tile.sequence[24..25], "T");
    assert_eq!(translator.translate_genome_variant(snp, tile), Ok((24, 25)));

    // The reference tile does not carry the alternate base
    let reference = library.tile_variant(position(0).reference_variant()).unwrap();
    assert!(matches!(
        translator.translate_genome_variant(snp, reference),
        Err(TranslateError::MissingTranslation { .. })
    ));
}

#[test]
fn test_snp_translation_mismatch() {
    let text = std::fs::read_to_string(data_path("library.json")).unwrap();
    let mut data: serde_json::Value = serde_json::from_str(&text).unwrap();
    data["genome_variants"][0]["alternate_bases"] = serde_json::json!("G");
    let library = TileLibrary::from_json(&data.to_string()).unwrap();
    let translator = VariantTranslator::new(LocusIndex::new(&library), Assembly::Grch37);

    let snp = library.genome_variant(GenomeVariantId(1)).unwrap();
    let tile = library
        .tile_variant(TileVariantId::new(position(0), 1))
        .unwrap();
    match translator.translate_genome_variant(snp, tile) {
        Err(TranslateError::TranslationMismatch {
            which,
            expected,
            found,
            ..
        }) => {
            assert_eq!(which, "alternate");
            assert_eq!(expected, "G");
            assert_eq!(found, "T");
        }
        other => panic!("expected TranslationMismatch, got {other:?}"),
    }
}

#[test]
fn test_resolver_spanning_into_position() {
    let library = load_library();
    let resolver = RangeResolver::new(LocusIndex::new(&library));
    assert_eq!(
        resolver.spanning_into(position(2)).unwrap(),
        vec![TileVariantId::new(position(1), 1)]
    );
    assert!(resolver.spanning_into(position(1)).unwrap().is_empty());
}

#[test]
fn test_non_hex_token_is_rejected() {
    let err = Call::parse("zzz.00.0000.000", &AddressConfig::default()).unwrap_err();
    assert!(matches!(err, AddressError::MalformedToken { .. }));
}
