use env_logger::Env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Routes the crate's `log` output to the test harness. Run tests with
/// `--features log` and `RUST_LOG=trace` to see it.
pub(crate) fn setup_logger() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .is_test(true)
            .try_init();
    });
}
