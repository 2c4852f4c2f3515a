//! Log initialization. Controlled with `RUST_LOG`; defaults to `info` so a
//! run without any environment configuration still reports step milestones.

/// Initialize the global logger. Safe to call once at process start; a
/// second call is a no-op (errors from `env_logger` are swallowed, matching
/// the common CLI-tool idiom of "best effort logging, never fatal").
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
