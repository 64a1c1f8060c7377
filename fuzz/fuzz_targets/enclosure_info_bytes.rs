#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::{BufReader, Cursor};
use thermal_map::enclosure::EnclosureMap;

fuzz_target!(|data: &[u8]| {
    if let Ok(enclosure) = EnclosureMap::from_reader(BufReader::new(Cursor::new(data))) {
        assert_eq!(enclosure.strategies().len(), enclosure.sensor_count());
    }
});
