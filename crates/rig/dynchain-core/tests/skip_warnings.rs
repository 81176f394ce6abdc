use std::sync::Mutex;

use dynchain_core::{build_dynamic_chain, DynChainConfig};
use dynchain_test_fixtures::scenes;
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

/// Keeps every record emitted by this test binary.
struct Capture {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Lazy<Capture> = Lazy::new(|| Capture {
    records: Mutex::new(Vec::new()),
});

fn warnings() -> Vec<String> {
    CAPTURE
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, msg)| msg.clone())
        .collect()
}

#[test]
fn skipped_items_are_reported_as_warnings() {
    // the only test in this binary, so the logger is installed once
    log::set_logger(Lazy::<Capture>::force(&CAPTURE)).expect("no other logger installed");
    log::set_max_level(LevelFilter::Trace);

    let mut scene = scenes::load("mixed-selection").expect("fixture scene");
    let chain = build_dynamic_chain(&mut scene, &DynChainConfig::default()).expect("build ok");
    assert_eq!(chain.skipped.len(), 2);

    let warned = warnings();
    assert_eq!(
        warned,
        [
            "skipping selected item: chainShader. Not a dag node.",
            "skipping selected item: chainProxyShape. Not a transform.",
        ]
    );
}
