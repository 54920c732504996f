#![no_main]

use libfuzzer_sys::fuzz_target;
use tapspend_core::ControlBlock;

fuzz_target!(|data: &[u8]| {
    if let Ok(cb) = ControlBlock::from_slice(data) {
        assert_eq!(cb.size(), data.len());
        assert_eq!(cb.serialize(), data);
    }
});
