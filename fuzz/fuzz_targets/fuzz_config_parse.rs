#![no_main]
use libfuzzer_sys::fuzz_target;
use turbo::config::{create_validator, Config};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = Config::from_toml(s) {
            let _ = create_validator().validate(&config);
        }
    }
});
