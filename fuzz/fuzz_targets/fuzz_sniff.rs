#![no_main]
use camcred_core::ContentType;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(ct) = ContentType::sniff(data) {
        let _ = ct.preferred_mime_type();
        let _ = ct.is_video();
    }
});
