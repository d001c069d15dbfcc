//! Version information for codenet.

/// Codenet version from Cargo.toml
pub const CODENET_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver_like() {
        assert_eq!(CODENET_VERSION.split('.').count(), 3);
    }
}
