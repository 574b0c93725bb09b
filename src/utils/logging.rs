use tracing::Level;

/// Install the fmt subscriber for the binary.
///
/// `--verbose` lowers the threshold to `debug`, which adds per-message
/// processing times, decode failures and publisher jitter to the output.
pub fn init(verbose: bool) {
    // try_init so tests can call this more than once
    let _ = tracing_subscriber::fmt()
        .with_max_level(max_level(verbose))
        .with_target(false)
        .try_init();
}

pub fn max_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::INFO }
}
