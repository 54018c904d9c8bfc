#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use tdlogic_core::analysis::Analyzer;
use tdlogic_core::thread::ThreadSnapshot;

static ANALYZER: LazyLock<Analyzer> =
    LazyLock::new(|| Analyzer::builtin().expect("built-in analyzer"));

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(snapshot) = ThreadSnapshot::from_json(raw) else {
        return;
    };
    let analysis = ANALYZER.analyze(&snapshot);
    for group in &analysis.groups {
        for &id in &group.members {
            assert!(group.health() >= analysis.dump.thread(id).health());
        }
    }
    let _ = analysis.report();
});
