//! Tag & scope resolver: derives deterministic, opaque container
//! identifiers from a git email (or OS user) and an absolute directory
//! path, reusing the crate's existing `sha2`/`hex` dependencies rather
//! than pulling in anything new.

use sha2::{Digest, Sha256};

use crate::config::Config;

/// Derives the user-scope container tag. An explicit `USER_CONTAINER_TAG`
/// override always wins over the derived value.
pub fn resolve_user_tag(config: &Config, identity: &str) -> String {
    if let Some(tag) = &config.user_container_tag {
        return tag.clone();
    }
    format!(
        "{}_user_{}",
        config.container_tag_prefix,
        short_digest(identity)
    )
}

/// Derives the project-scope container tag from an absolute directory path.
/// An explicit `PROJECT_CONTAINER_TAG` override always wins.
pub fn resolve_project_tag(config: &Config, absolute_dir: &str) -> String {
    if let Some(tag) = &config.project_container_tag {
        return tag.clone();
    }
    format!(
        "{}_project_{}",
        config.container_tag_prefix,
        short_digest(absolute_dir)
    )
}

/// First 16 hex characters of the SHA-256 digest of `input`.
///
/// Callers must never log `input` next to the returned tag — the whole
/// point of hashing is that the source string (an email address, a
/// filesystem path) stays out of logs and telemetry.
fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> Config {
        Config::for_tests(PathBuf::from("/tmp/codexfi-test"))
    }

    #[test]
    fn derives_stable_tags() {
        let cfg = config();
        let a = resolve_user_tag(&cfg, "dev@example.com");
        let b = resolve_user_tag(&cfg, "dev@example.com");
        assert_eq!(a, b);
        assert!(a.starts_with("codexfi_user_"));
    }

    #[test]
    fn distinguishes_different_identities() {
        let cfg = config();
        let a = resolve_user_tag(&cfg, "dev@example.com");
        let b = resolve_user_tag(&cfg, "other@example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn project_tag_is_distinct_from_user_tag() {
        let cfg = config();
        let user = resolve_user_tag(&cfg, "dev@example.com");
        let project = resolve_project_tag(&cfg, "/home/dev/example.com");
        assert_ne!(user, project);
    }

    #[test]
    fn explicit_override_wins() {
        let mut cfg = config();
        cfg.user_container_tag = Some("fixed-tag".to_string());
        assert_eq!(resolve_user_tag(&cfg, "dev@example.com"), "fixed-tag");
    }
}
