//! Cache key definitions.

/// Fixed key under which the rendered home feed is stored.
pub const INDEX_PAGE_KEY: &str = "index_page";

/// Key for one page of the home feed. Every page number is cached on its own.
pub fn index_page_key(page: u32) -> String {
    format!("{INDEX_PAGE_KEY}:{page}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keys_are_namespaced_by_page() {
        assert_eq!(index_page_key(1), "index_page:1");
        assert_ne!(index_page_key(1), index_page_key(2));
    }
}
