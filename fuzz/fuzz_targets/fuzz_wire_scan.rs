#![no_main]

use libfuzzer_sys::fuzz_target;
use mp4_gps_track::{GpsScanner, scanner::scan_wire};

fuzz_target!(|data: &[u8]| {
    let _ = scan_wire(data);
    let _ = GpsScanner::new().scan(data);
});
