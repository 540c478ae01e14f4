pub mod cluster;
pub mod store;

pub use cluster::TestCluster;
pub use store::TestStore;

use confstore_core::Parameter;

/// Parameters from `(name, value)` pairs, in the given order.
pub fn params(pairs: &[(&str, &str)]) -> Vec<Parameter> {
    pairs.iter().map(|(n, v)| Parameter::new(*n, *v)).collect()
}

/// Route engine logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}
