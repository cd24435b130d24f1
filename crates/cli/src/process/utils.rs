use crate::version::BuildInfo;

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = BuildInfo::current();

    tracing::debug!(
        build_profile = build.build_profile,
        built_at = build.build_timestamp,
        version = build.version,
        "redact starting up"
    );
}
