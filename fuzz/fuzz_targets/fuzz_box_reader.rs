#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use mp4_gps_track::{BoxReader, BoxType};

fuzz_target!(|data: &[u8]| {
    let Ok(reader) = BoxReader::new(Cursor::new(data)) else {
        return;
    };
    let Ok(mut reader) = reader.with_read_limits(256, 128) else {
        return;
    };
    if let Ok(Some(range)) = reader.locate(BoxType::MOOV) {
        let _ = reader.read_payload(&range);
    }
});
