use tracing_subscriber::EnvFilter;

/// Logs go to stderr so they never interleave with answers on stdout.
/// `-v` flags win over `RUST_LOG`; without either only warnings show.
pub fn init(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("warn,toolchat=info"),
        _ => EnvFilter::new("info,toolchat=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
