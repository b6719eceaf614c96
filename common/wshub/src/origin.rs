/// Checks an upgrade request's `Origin` header against the configured
/// allow-list. An empty allow-list refuses every upgrade rather than
/// defaulting open.
pub fn is_allowed_origin(origin: Option<&str>, allow_list: &[String]) -> bool {
    let Some(origin) = origin else { return false };
    allow_list.iter().any(|allowed| allowed == origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_origin() {
        assert!(!is_allowed_origin(None, &["https://eduhub.example".to_string()]));
    }

    #[test]
    fn rejects_origin_not_in_list() {
        let allow = vec!["https://eduhub.example".to_string()];
        assert!(!is_allowed_origin(Some("https://evil.example"), &allow));
    }

    #[test]
    fn accepts_listed_origin() {
        let allow = vec!["https://eduhub.example".to_string()];
        assert!(is_allowed_origin(Some("https://eduhub.example"), &allow));
    }

    #[test]
    fn empty_allow_list_refuses_everything() {
        assert!(!is_allowed_origin(Some("https://eduhub.example"), &[]));
    }
}
