use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for console page paths used in the route policy
    /// Absolute, lowercase segments of alphanumerics and hyphens, no trailing slash
    /// - Valid: "/dashboard", "/problems/role-play", "/level-tests"
    /// - Invalid: "dashboard", "/", "/problems/", "/Problems", "/a//b"
    pub static ref ROUTE_PATH_REGEX: Regex = Regex::new(r"^/[a-z0-9-]+(?:/[a-z0-9-]+)*$").unwrap();

    /// Regex for subject ids issued by the identity provider
    /// - Valid: "u1", "a1b2c3", "user_01-x"
    /// - Invalid: "", "a b", "user/1", "é"
    pub static ref SUBJECT_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path_regex_valid() {
        assert!(ROUTE_PATH_REGEX.is_match("/dashboard"));
        assert!(ROUTE_PATH_REGEX.is_match("/problems/role-play"));
        assert!(ROUTE_PATH_REGEX.is_match("/level-tests"));
        assert!(ROUTE_PATH_REGEX.is_match("/a/b/c"));
    }

    #[test]
    fn test_route_path_regex_invalid() {
        assert!(!ROUTE_PATH_REGEX.is_match("dashboard")); // relative
        assert!(!ROUTE_PATH_REGEX.is_match("/")); // root only
        assert!(!ROUTE_PATH_REGEX.is_match("/problems/")); // trailing slash
        assert!(!ROUTE_PATH_REGEX.is_match("/Problems")); // uppercase
        assert!(!ROUTE_PATH_REGEX.is_match("/a//b")); // empty segment
        assert!(!ROUTE_PATH_REGEX.is_match("/problems?x=1")); // query
    }

    #[test]
    fn test_subject_id_regex() {
        assert!(SUBJECT_ID_REGEX.is_match("u1"));
        assert!(SUBJECT_ID_REGEX.is_match("user_01-x"));
        assert!(!SUBJECT_ID_REGEX.is_match(""));
        assert!(!SUBJECT_ID_REGEX.is_match("a b"));
        assert!(!SUBJECT_ID_REGEX.is_match("user/1"));
        assert!(!SUBJECT_ID_REGEX.is_match(&"x".repeat(129)));
    }
}
