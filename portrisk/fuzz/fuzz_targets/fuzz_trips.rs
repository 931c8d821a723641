// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]
use libfuzzer_sys::fuzz_target;
use portrisk::io::table::read_records_from;
use portrisk::trips::fishing::{encode_split, split_trips, FishingTrip, REQUIRED_COLUMNS};
use portrisk::trips::RiskKind;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a trip table: reading, splitting and encoding
    // must return errors, never panic.
    let Ok(trips) = read_records_from::<_, FishingTrip>(data, "fuzz", &REQUIRED_COLUMNS) else {
        return;
    };
    for kind in [RiskKind::Iuu, RiskKind::LaborAbuse] {
        let split = split_trips(trips.clone(), kind);
        let _ = encode_split(&split);
    }
});
