use std::fmt;

/// Version information fixed at compile time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub build_timestamp: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            build_profile: env!("REDACT_BUILD_PROFILE"),
            build_timestamp: env!("REDACT_BUILD_TIMESTAMP"),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "redact {} ({} build, {})",
            self.version, self.build_profile, self.build_timestamp
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_names_the_version() {
        let info = BuildInfo::current();
        let shown = info.to_string();
        assert!(shown.starts_with("redact "));
        assert!(shown.contains(env!("CARGO_PKG_VERSION")));
    }
}
