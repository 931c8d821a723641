// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed trace files must decode to an error, never panic.
    let _ = portrisk::io::trace::decode(data);
});
