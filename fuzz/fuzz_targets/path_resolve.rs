#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

use logroute_pipeline::store::resolve_relative;

fuzz_target!(|data: &[u8]| {
    let Ok(relative) = std::str::from_utf8(data) else {
        return;
    };
    let root = Path::new("/var/log/app");
    if let Ok(resolved) = resolve_relative(root, relative) {
        assert!(resolved.full.starts_with(root));
        assert!(resolved.full.starts_with(&resolved.dir));
        assert!(!resolved.relative.split('/').any(|s| s == ".."));
    }
});
