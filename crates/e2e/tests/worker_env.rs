//! Serial runs under an externally assigned worker id. Lives in its own test
//! binary because it sets process environment.

mod common;

use std::sync::Arc;

use common::{config_in, files_in, registry_with, FakeBrowser};
use playrun_common::{CapturePolicy, Parallelism, WORKER_ENV};
use playrun_e2e::{Session, TestCase, TestIdentity};

#[test]
fn serial_run_takes_worker_id_from_environment() {
    std::env::set_var(WORKER_ENV, "shard-3");

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.capture.video = CapturePolicy::Always;
    let session = Session::begin(Arc::new(config), Arc::new(registry_with(FakeBrowser::new())))
        .unwrap()
        .with_worker_logs(false, false);

    let case = TestCase::new(
        TestIdentity::new("tests/ui/inventory/inventory.rs::shows_products"),
        |ctx| ctx.page()?.goto("https://shop.test/inventory"),
    );
    let outcomes = session.run(vec![case], Parallelism::Off).unwrap();

    assert_eq!(outcomes[0].worker_id, "shard-3");
    assert_eq!(
        files_in(&dir.path().join("videos").join("shard-3")),
        vec![format!("{}.webm", outcomes[0].test_id)]
    );
    assert!(!dir.path().join("videos").join("master").exists());
}
