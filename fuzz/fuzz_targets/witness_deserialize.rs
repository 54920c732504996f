#![no_main]

use libfuzzer_sys::fuzz_target;
use tapspend_core::WitnessStack;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must parse to Ok or Err, never panic.
    if let Ok(stack) = WitnessStack::deserialize(data) {
        // Anything accepted is canonical, so it re-encodes to the same bytes.
        let bytes = stack.serialize().expect("parsed witness re-serializes");
        assert_eq!(bytes, data);
    }
});
