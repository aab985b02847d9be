/// Initialize logging for demos and tests. Honors `RUST_LOG`, defaults to
/// debug level.
pub fn setup_logger() {
    let mut builder = env_logger::Builder::from_default_env();

    builder
        .filter_level(log::LevelFilter::Debug)
        .format_timestamp_millis();

    let _ = builder.try_init();
}
