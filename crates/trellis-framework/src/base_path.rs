//! Mount path inferred from the invoking script.

/// The directory part of `script_name`, unless it is the web root.
///
/// `/test/index.php` yields `/test`; `/index.php` and names without a
/// directory yield `None`.
pub fn script_base_path(script_name: &str) -> Option<&str> {
    let (directory, _) = script_name.trim().rsplit_once('/')?;
    match directory.trim_end_matches('/') {
        "" | "." => None,
        directory => Some(directory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_base_path() {
        assert_eq!(script_base_path("/test/index.php"), Some("/test"));
        assert_eq!(script_base_path("/a/b/app.cgi"), Some("/a/b"));
        assert_eq!(script_base_path("/index.php"), None);
        assert_eq!(script_base_path("index.php"), None);
        assert_eq!(script_base_path("./index.php"), None);
        assert_eq!(script_base_path(""), None);
    }
}
