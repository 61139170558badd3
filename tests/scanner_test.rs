//! テレメトリーサンプルのデコードと緯度経度の候補の判定のテスト
use std::num::NonZeroU32;

use mp4_gps_track::{
    GpsCandidate, GpsScanner,
    boxes::SttsEntry,
    plausibility::PlausibilityFilter,
    scanner::scan_wire,
    schema::{BlindDecoder, Number, SchemaGuesser, Value},
    timing::build_pts_ms,
};

mod common;
use common::*;

fn runs(runs: &[(u32, u32)]) -> Vec<SttsEntry> {
    runs.iter()
        .map(|&(sample_count, sample_delta)| SttsEntry {
            sample_count,
            sample_delta,
        })
        .collect()
}

fn timescale(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap()
}

#[test]
fn pts_pads_short_duration_table_with_last_delta() {
    let pts = build_pts_ms(5, timescale(1000), &runs(&[(3, 10)]));
    assert_eq!(pts, vec![0, 10, 20, 30, 40]);
}

#[test]
fn pts_truncates_long_duration_table() {
    let pts = build_pts_ms(2, timescale(1000), &runs(&[(3, 10), (2, 500)]));
    assert_eq!(pts, vec![0, 10]);
}

#[test]
fn pts_uses_floor_division() {
    // 1001 / 30000 秒 = 33.3666... ミリ秒
    let pts = build_pts_ms(4, timescale(30000), &runs(&[(4, 1001)]));
    assert_eq!(pts, vec![0, 33, 66, 100]);
}

#[test]
fn pts_without_durations_is_all_zero() {
    assert_eq!(build_pts_ms(3, timescale(1000), &[]), vec![0, 0, 0]);
    assert!(build_pts_ms(0, timescale(1000), &runs(&[(3, 10)])).is_empty());
}

#[test]
fn pts_saturates_instead_of_wrapping() {
    // 約 215 万サンプル目で i64 のミリ秒に収まらなくなる
    let count = 3_000_000;
    let pts = build_pts_ms(count, timescale(1), &runs(&[(count as u32, u32::MAX)]));
    assert_eq!(pts.len(), count);
    assert!(pts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(pts[count - 1], i64::MAX);
    assert_eq!(pts[1], u32::MAX as i64 * 1000);
}

#[test]
fn filter_rejects_known_false_positives() {
    let filter = PlausibilityFilter::default();
    assert!(!filter.accepts(23.976, 45.0));
    assert!(!filter.accepts(45.0, 59.94));
    assert!(!filter.accepts(30.0, 45.0));
    assert!(filter.accepts(-30.0, 45.0));
    assert!(!filter.accepts(0.005, 120.0));
    assert!(!filter.accepts(35.0, 0.0));
    assert!(!filter.accepts(f64::NAN, 120.0));
    assert!(!filter.accepts(91.0, 120.0));
    assert!(!filter.accepts(45.0, -180.5));
    assert!(filter.accepts(35.6895, 139.6917));
    assert!(filter.accepts(-33.8688, 151.2093));
    assert!(filter.accepts(37.7749, -122.4194));
}

#[test]
fn strict_filter_rejects_small_magnitudes() {
    assert!(PlausibilityFilter::new(false).accepts(0.5, 120.0));
    assert!(!PlausibilityFilter::new(true).accepts(0.5, 120.0));
    assert!(!PlausibilityFilter::new(true).accepts(51.5, -0.12));
    assert!(PlausibilityFilter::new(true).accepts(35.6895, 139.6917));
}

#[test]
fn adjacent_values_are_paired_in_either_order() {
    let expected = GpsCandidate {
        latitude: 35.6895,
        longitude: 139.6917,
    };
    assert_eq!(GpsCandidate::from_adjacent(35.6895, 139.6917), Some(expected));
    assert_eq!(GpsCandidate::from_adjacent(139.6917, 35.6895), Some(expected));
    assert_eq!(GpsCandidate::from_adjacent(139.6917, 120.0), None);
}

#[test]
fn wire_walk_finds_fixed_point_pair() {
    let mut payload = varint_field(1, 356_895_000);
    payload.extend(varint_field(2, 1_396_917_000));

    let expected = vec![GpsCandidate {
        latitude: 35.6895,
        longitude: 139.6917,
    }];
    assert_eq!(scan_wire(&payload), expected);
    assert_eq!(GpsScanner::wire_only().scan(&payload), expected);
    assert_eq!(GpsScanner::new().scan(&payload), expected);
}

#[test]
fn wire_walk_skips_out_of_range_varints_and_recurses() {
    let mut inner = degrees_field(1, -33.8688);
    inner.extend(degrees_field(2, 151.2093));

    let mut payload = varint_field(1, 4_000_000_000); // 400 度
    payload.extend(bytes_field(2, &inner));
    payload.extend(fixed64_field(3, 1e12));

    let found = scan_wire(&payload);
    assert_eq!(found.len(), 1);
    assert!(approx_eq(found[0].latitude, -33.8688));
    assert!(approx_eq(found[0].longitude, 151.2093));
}

#[test]
fn wire_walk_keeps_numbers_read_before_malformed_bytes() {
    let mut payload = fixed64_field(1, 35.6895);
    payload.extend(fixed64_field(2, 139.6917));
    payload.extend_from_slice(&[0x1a, 0x7f, 0x01]); // 長さが末尾を越える
    assert_eq!(
        scan_wire(&payload),
        vec![GpsCandidate {
            latitude: 35.6895,
            longitude: 139.6917
        }]
    );

    assert!(scan_wire(&[0x0b, 0x08, 0x01]).is_empty()); // グループは扱わない
    assert!(scan_wire(&[]).is_empty());
}

#[test]
fn wire_walk_reads_fixed32_as_fixed_point() {
    // 単精度浮動小数点数としては 1e10 を越えるので、固定小数点としての解釈のみが残る
    let mut payload = varint_field(1, 356_895_000);
    payload.extend(fixed32_field(2, 1_396_917_000i32.to_le_bytes()));
    assert_eq!(
        scan_wire(&payload),
        vec![GpsCandidate {
            latitude: 35.6895,
            longitude: 139.6917
        }]
    );
}

#[test]
fn blind_decoder_guesses_structure() {
    let mut nested = varint_field(1, 7);
    nested.extend(fixed32_field(2, 1.5f32.to_le_bytes()));

    let mut payload = varint_field(1, 1);
    payload.extend(bytes_field(2, b"hello"));
    payload.extend(bytes_field(3, &[0xff, 0xfe]));
    payload.extend(bytes_field(4, &nested));
    payload.extend(varint_field(1, 2));
    payload.extend(fixed64_field(5, -2.25));

    let value = BlindDecoder.guess(&payload).unwrap();
    assert_eq!(
        value,
        Value::Mapping(vec![
            (
                "1".to_owned(),
                Value::Sequence(vec![
                    Value::Number(Number::Int(1)),
                    Value::Number(Number::Int(2))
                ])
            ),
            ("2".to_owned(), Value::Text("hello".to_owned())),
            ("3".to_owned(), Value::Text("0xfffe".to_owned())),
            (
                "4".to_owned(),
                Value::Mapping(vec![
                    ("1".to_owned(), Value::Number(Number::Int(7))),
                    ("2".to_owned(), Value::Number(Number::Float(1.5))),
                ])
            ),
            ("5".to_owned(), Value::Number(Number::Float(-2.25))),
        ])
    );

    assert!(BlindDecoder.guess(&[]).is_none());
    assert!(BlindDecoder.guess(&[0x08]).is_none());
}

#[test]
fn scanner_scales_fixed_point_leaves_and_parses_text() {
    let mut payload = bytes_field(1, b"35.6895");
    payload.extend(bytes_field(2, b"139.6917"));
    assert_eq!(
        GpsScanner::new().scan(&payload),
        vec![GpsCandidate {
            latitude: 35.6895,
            longitude: 139.6917
        }]
    );

    let found = GpsScanner::new().scan(&telemetry_sample(37.7749, -122.4194));
    assert_eq!(found.len(), 1);
    assert!(approx_eq(found[0].latitude, 37.7749));
    assert!(approx_eq(found[0].longitude, -122.4194));
}

struct FixedGuess(Option<Value>);

impl SchemaGuesser for FixedGuess {
    fn guess(&self, _payload: &[u8]) -> Option<Value> {
        self.0.clone()
    }
}

#[test]
fn scanner_uses_custom_guesser_and_falls_back_to_wire_walk() {
    let guessed = Value::Mapping(vec![(
        "position".to_owned(),
        Value::Sequence(vec![
            Value::Number(Number::Float(48.8566)),
            Value::Number(Number::Float(2.3522)),
        ]),
    )]);
    let scanner = GpsScanner::with_guesser(FixedGuess(Some(guessed)));
    assert_eq!(
        scanner.scan(&[]),
        vec![GpsCandidate {
            latitude: 48.8566,
            longitude: 2.3522
        }]
    );

    let mut payload = varint_field(1, 356_895_000);
    payload.extend(varint_field(2, 1_396_917_000));
    for guess in [None, Some(Value::Text("no numbers".to_owned()))] {
        let scanner = GpsScanner::with_guesser(FixedGuess(guess));
        assert_eq!(scanner.scan(&payload).len(), 1);
    }
}
