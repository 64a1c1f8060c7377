#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::{BufReader, Cursor};
use thermal_map::result_store::{EnergyPlusCsvStore, ZoneResultStore, ZONE_AIR_TEMPERATURE};

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = EnergyPlusCsvStore::from_reader(BufReader::new(Cursor::new(data))) {
        let period = store.reporting_period();
        if let Ok(series) = store.series_for(ZONE_AIR_TEMPERATURE) {
            assert!(series.values().all(|s| s.len() == period.len()));
        }
    }
});
