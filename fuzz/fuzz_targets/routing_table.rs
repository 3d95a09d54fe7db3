#![no_main]

use libfuzzer_sys::fuzz_target;

use logroute_pipeline::RoutingTable;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(table) = RoutingTable::parse(text) {
        for route in table.routes() {
            assert!(table.get(&route.flag).is_some());
            assert!(!route.path_template.is_empty());
        }
    }
});
