use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Maps the number of `-v` flags to a maximum log level: none is warn, then info, debug and
/// trace.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. Logs go to stderr; stdout is kept for the map of output paths.
pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level_for_verbosity(verbosity))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
