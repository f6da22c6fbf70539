/// Lazy iterator over a path and each of its ancestors
///
/// For `/blog/[slug]/edit` it yields `/blog/[slug]/edit`, `/blog/[slug]`,
/// `/blog`, `/`. Used for segment-aware prefix matching: a middleware
/// registered at `/blog` covers a route exactly when `/blog` is one of the
/// route's ancestors, so `/blogging` is never matched by accident.
///
/// Borrows from the input; no allocations.
///
/// ```
/// use nxpack_router::path::PathHierarchy;
///
/// let paths: Vec<&str> = PathHierarchy::new("/a/b").collect();
/// assert_eq!(paths, vec!["/a/b", "/a", "/"]);
/// ```
#[derive(Debug, Clone)]
pub struct PathHierarchy<'a> {
    current: Option<&'a str>,
}

impl<'a> PathHierarchy<'a> {
    /// Starts the walk at `path` (a trailing slash is ignored)
    pub fn new(path: &'a str) -> Self {
        let start = match path.strip_suffix('/') {
            Some("") | None => path,
            Some(stripped) => stripped,
        };
        Self {
            current: Some(start),
        }
    }

    /// Whether `prefix` is the path itself or one of its ancestors
    pub fn contains(mut self, prefix: &str) -> bool {
        let prefix = match prefix.strip_suffix('/') {
            Some("") | None => prefix,
            Some(stripped) => stripped,
        };
        self.any(|p| p == prefix)
    }
}

impl<'a> Iterator for PathHierarchy<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;

        self.current = if current == "/" {
            None
        } else {
            match current.rfind('/') {
                Some(0) => Some("/"),
                Some(slash) => Some(&current[..slash]),
                None => None,
            }
        };

        Some(current)
    }
}
