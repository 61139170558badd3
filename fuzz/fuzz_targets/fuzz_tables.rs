#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_gps_track::boxes::{
    ChunkOffsetBox, HdlrBox, MdhdBox, MvhdBox, StscBox, StsdBox, SttsBox, StszBox,
};

fuzz_target!(|data: &[u8]| {
    let _ = StszBox::from_payload(data).sample_count();
    let _ = SttsBox::from_payload(data).total_sample_count();
    let _ = MdhdBox::from_payload(data);
    let _ = MvhdBox::from_payload(data);
    let _ = HdlrBox::from_payload(data);
    let _ = StsdBox::from_payload(data);
    let _ = StscBox::from_payload(data);
    let _ = ChunkOffsetBox::from_stco_payload(data);
    let _ = ChunkOffsetBox::from_co64_payload(data);
});
