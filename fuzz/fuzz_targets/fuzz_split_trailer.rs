#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some((media, claim)) = camcred_sign::trailer::split_trailer(data) {
        assert!(media.len() + claim.len() <= data.len());
    }
});
