//! Namespace Resolver
//!
//! Maps a client-visible logical path onto a provider key under one of two
//! disjoint roots. The tier is chosen by the request flag, never by the
//! path string, and neither root is a prefix of the other, so prefix-scoped
//! listings and deletes stay inside their tier.

use crate::error::{Error, Result};

/// Root of the public tree
pub const PUBLIC_ROOT: &str = "public/";

/// Root of the private tree
pub const PRIVATE_ROOT: &str = ".private/";

/// Provider key root for a tier flag
pub fn root(is_private: bool) -> &'static str {
    if is_private {
        PRIVATE_ROOT
    } else {
        PUBLIC_ROOT
    }
}

/// Provider key for a logical path
pub fn provider_key(logical: &str, is_private: bool) -> String {
    format!("{}{}", root(is_private), logical.trim_start_matches('/'))
}

/// Provider prefix for a logical folder, always ending in `/`
pub fn folder_prefix(logical: &str, is_private: bool) -> String {
    let mut key = provider_key(logical, is_private);
    if !key.ends_with('/') {
        key.push('/');
    }
    key
}

/// Display name of a key found under `prefix`
pub fn display_name<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix).unwrap_or(key)
}

/// Logical path of a provider key, `None` if the key lies outside the tier
pub fn logical_path(key: &str, is_private: bool) -> Option<&str> {
    key.strip_prefix(root(is_private))
}

/// Reject logical paths that could be reinterpreted on the way to the store.
///
/// `.`/`..` segments are normalised away by browsers and proxies, which
/// would let a URL for one tier address an object in the other.
pub fn validate(logical: &str) -> Result<()> {
    if logical.contains('\\') {
        return Err(Error::InvalidPath(format!("backslash in {:?}", logical)));
    }
    if logical.chars().any(char::is_control) {
        return Err(Error::InvalidPath("control character in path".into()));
    }
    if logical.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(Error::InvalidPath(format!("dot segment in {:?}", logical)));
    }
    Ok(())
}

/// Whether a logical path names a folder
pub fn is_folder(logical: &str) -> bool {
    logical.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::{Distribution, Uniform};
    use rand::Rng;

    #[test]
    fn test_provider_key() {
        assert_eq!(provider_key("", false), "public/");
        assert_eq!(provider_key("", true), ".private/");
        assert_eq!(provider_key("docs/a.txt", false), "public/docs/a.txt");
        assert_eq!(provider_key("/docs/a.txt", true), ".private/docs/a.txt");
        assert_eq!(provider_key("//docs/", true), ".private/docs/");
    }

    #[test]
    fn test_folder_prefix() {
        assert_eq!(folder_prefix("", false), "public/");
        assert_eq!(folder_prefix("/", true), ".private/");
        assert_eq!(folder_prefix("docs", false), "public/docs/");
        assert_eq!(folder_prefix("docs/", false), "public/docs/");
    }

    #[test]
    fn test_display_and_logical() {
        assert_eq!(display_name("public/docs/", "public/docs/a.txt"), "a.txt");
        assert_eq!(logical_path(".private/x/y", true), Some("x/y"));
        assert_eq!(logical_path(".private/x/y", false), None);
        assert_eq!(logical_path("public/x", false), Some("x"));
    }

    #[test]
    fn test_path_string_cannot_cross_tiers() {
        // A public path that spells out the private root stays public
        assert_eq!(provider_key(".private/secret", false), "public/.private/secret");
        assert_eq!(provider_key("/public/x", true), ".private/public/x");
    }

    #[test]
    fn test_roots_disjoint_for_random_paths() {
        let mut rng = rand::thread_rng();
        let alphabet: Vec<char> = "ab./_- privatepublic".chars().collect();
        let pick = Uniform::from(0..alphabet.len());

        for _ in 0..2000 {
            let len = rng.gen_range(0..24);
            let path: String = (0..len).map(|_| alphabet[pick.sample(&mut rng)]).collect();
            let public = provider_key(&path, false);
            let private = provider_key(&path, true);
            assert_ne!(public, private);
            assert!(!public.starts_with(&private), "{:?}", path);
            assert!(!private.starts_with(&public), "{:?}", path);
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate("").is_ok());
        assert!(validate("docs/a.txt").is_ok());
        assert!(validate("docs/.hidden/").is_ok());
        assert!(validate("docs/../.private/x").is_err());
        assert!(validate("./x").is_err());
        assert!(validate("a\\b").is_err());
        assert!(validate("a\nb").is_err());
    }
}
