#![no_main]

use exeinfo::{detect, SliceReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Detection must classify anything without panicking.
    let _ = detect(&SliceReader::new(data));
});
