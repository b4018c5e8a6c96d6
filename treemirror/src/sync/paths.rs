/// Maps `path` from under `old_prefix` to the same place under `new_prefix`.
///
/// `old_prefix` is compared with exactly one trailing separator, so
/// `/src` never matches `/srcfoo/x`. The prefix directory itself maps to
/// `new_prefix`.
pub fn remap(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    let old = format!("{}/", old_prefix.trim_end_matches('/'));
    let new = new_prefix.trim_end_matches('/');
    if path.trim_end_matches('/') == old.trim_end_matches('/') {
        return Some(if new.is_empty() { "/".to_string() } else { new.to_string() });
    }
    let rest = path.strip_prefix(&old)?;
    Some(format!("{new}/{rest}"))
}

/// Joins a directory path and an entry name with a single separator.
pub fn join_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Directories strictly between `top` and `path`, outermost first. Empty
/// when `path` is not below `top`.
pub fn ancestors_below(path: &str, top: &str) -> Vec<String> {
    let top = top.trim_end_matches('/');
    let Some(rest) = path.strip_prefix(top).and_then(|rest| rest.strip_prefix('/')) else {
        return Vec::new();
    };
    let segments: Vec<&str> = rest.split('/').filter(|segment| !segment.is_empty()).collect();
    let mut current = top.to_string();
    let mut out = Vec::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current = join_path(&current, segment);
        out.push(current.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_source_path_under_destination() {
        assert_eq!(
            remap("/src/a/b.txt", "/src", "/dst").as_deref(),
            Some("/dst/a/b.txt")
        );
    }

    #[test]
    fn trailing_separators_on_prefixes_are_normalized() {
        assert_eq!(
            remap("/src/a/b.txt", "/src///", "/dst/").as_deref(),
            Some("/dst/a/b.txt")
        );
    }

    #[test]
    fn rejects_paths_outside_prefix() {
        assert_eq!(remap("/other/x", "/src", "/dst"), None);
        assert_eq!(remap("/srcfoo/x", "/src", "/dst"), None);
    }

    #[test]
    fn prefix_itself_maps_to_new_prefix() {
        assert_eq!(remap("/src", "/src", "/dst").as_deref(), Some("/dst"));
        assert_eq!(remap("/src/", "/src", "/").as_deref(), Some("/"));
    }

    #[test]
    fn lists_intermediate_directories_only() {
        assert_eq!(
            ancestors_below("/data/a/b/c", "/data"),
            vec!["/data/a".to_string(), "/data/a/b".to_string()]
        );
        assert!(ancestors_below("/data/a", "/data/").is_empty());
        assert!(ancestors_below("/other/a/b", "/data").is_empty());
        assert_eq!(ancestors_below("/x/y", "/"), vec!["/x".to_string()]);
    }

    #[test]
    fn joins_with_single_separator() {
        assert_eq!(join_path("/data/", "a.txt"), "/data/a.txt");
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
    }
}
