use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` picks the filter, default
/// `info`; `-v` forces `debug`. Library crates log through `log`, which the
/// subscriber picks up.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
