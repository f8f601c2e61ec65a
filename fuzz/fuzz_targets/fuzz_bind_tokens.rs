#![no_main]
use libfuzzer_sys::fuzz_target;
use turbo::commands::binder::bind_tokens;
use turbo::commands::{builtin, extract_tokens, BoundArgs};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some((_command, tokens)) = extract_tokens(text, "!") else {
        return;
    };
    for handler in builtin::all() {
        let spec = handler.spec();
        let mut args = BoundArgs::default();
        let _ = bind_tokens(&spec, &tokens, &mut args);
    }
});
