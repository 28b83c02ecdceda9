#![no_main]

use jpegr_metadata::exif;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Patching arbitrary bytes must reject cleanly, never panic
    let mut dest = vec![0u8; data.len() + exif::ENTRY_SIZE];
    let _ = exif::update_exif(Some(data), &mut dest);

    // Undersized destinations must fail with BufferTooSmall
    let mut small = vec![0u8; data.len() / 2];
    let _ = exif::update_exif(Some(data), &mut small);
});
