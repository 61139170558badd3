#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_gps_track::{BoxType, box_tree::find_boxes};

fuzz_target!(|data: &[u8]| {
    for ty in [BoxType::TRAK, BoxType::STBL, BoxType::STSZ, BoxType::MDHD] {
        for range in find_boxes(data, ty) {
            let _ = range.slice(data);
        }
    }
});
