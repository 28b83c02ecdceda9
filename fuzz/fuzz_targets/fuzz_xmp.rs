#![no_main]

use jpegr_metadata::xmp;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any input either parses or is rejected; no partial state, no panic
    let _ = xmp::extract_metadata(data);
});
