// Build-time version from Cargo.toml, served on GET /version

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name/version`, logged at startup.
pub fn describe() -> String {
    format!("{}/{}", NAME, VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_name_and_version() {
        assert_eq!(describe(), format!("mactrace/{}", VERSION));
    }
}
