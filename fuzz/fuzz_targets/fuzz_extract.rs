#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use mp4_gps_track::{ExtractOptions, GpsExtractor, TrackSelector};

fuzz_target!(|data: &[u8]| {
    let extractor = GpsExtractor::new(ExtractOptions {
        track: TrackSelector::Index(0),
        ..Default::default()
    });
    let _ = extractor.extract_from_reader(Cursor::new(data));
});
