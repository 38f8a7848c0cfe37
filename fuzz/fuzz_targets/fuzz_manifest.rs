#![no_main]
use camcred_core::{ContentType, ManifestBuilder};
use chrono::{FixedOffset, TimeZone};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let secs = i64::from_le_bytes(data[..8].try_into().unwrap()) % 253_402_300_799;
    let offset = i32::from_le_bytes(data[8..12].try_into().unwrap()) % 86_400;
    let Some(tz) = FixedOffset::east_opt(offset) else {
        return;
    };
    let Some(ts) = tz.timestamp_opt(secs, 0).single() else {
        return;
    };
    let id = String::from_utf8_lossy(&data[12..]);
    if let Ok(manifest) = ManifestBuilder::default().build(&ContentType::new(id.as_ref()), ts) {
        assert!(manifest.title().ends_with(manifest.extension()));
        let _ = serde_json::to_string(&manifest);
    }
});
