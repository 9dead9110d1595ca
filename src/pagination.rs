use axum::http::Uri;
use serde::{Deserialize, Serialize};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct PageSize(pub i64);

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn limit(&self, default: PageSize) -> i64 {
        self.limit
            .filter(|limit| *limit > 0)
            .unwrap_or(default.0)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self, default: PageSize) -> i64 {
        (self.page() - 1).saturating_mul(self.limit(default))
    }
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_rows(results: Vec<T>, count: i64, query: &PageQuery, size: PageSize, uri: &Uri) -> Self {
        let page = query.page();
        let limit = query.limit(size);
        let last_page = (count.saturating_add(limit - 1) / limit).max(1);

        Self {
            count,
            next: (page < last_page).then(|| page_link(uri, page + 1)),
            previous: (page > 1).then(|| page_link(uri, (page - 1).min(last_page))),
            results,
        }
    }
}

/// Rewrites the `page` parameter of `uri`, keeping every other query parameter in order.
pub fn page_link(uri: &Uri, page: i64) -> String {
    let mut pairs: Vec<(String, String)> = uri
        .query()
        .and_then(|query| serde_urlencoded::from_str(query).ok())
        .unwrap_or_default();

    pairs.retain(|(key, _)| key != "page");
    if page > 1 {
        pairs.push(("page".to_string(), page.to_string()));
    }

    match serde_urlencoded::to_string(&pairs) {
        Ok(query) if !query.is_empty() => format!("{}?{}", uri.path(), query),
        _ => uri.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(value: &str) -> Uri {
        value.parse().unwrap()
    }

    #[test]
    fn defaults_to_first_page_of_configured_size() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(PageSize(6)), 6);
        assert_eq!(query.offset(PageSize(6)), 0);
    }

    #[test]
    fn offset_follows_page_and_limit() {
        let query = PageQuery {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(query.offset(PageSize(6)), 20);
    }

    #[test]
    fn huge_page_saturates_offset() {
        let query = PageQuery {
            page: Some(i64::MAX),
            limit: Some(10),
        };
        assert_eq!(query.offset(PageSize(6)), i64::MAX);
    }

    #[test]
    fn huge_page_is_empty_and_links_back() {
        let query = PageQuery {
            page: Some(i64::MAX),
            limit: None,
        };
        let page = Page::<i32>::from_rows(vec![], 7, &query, PageSize(6), &uri("/api/recipes/?page=9223372036854775807"));

        assert!(page.results.is_empty());
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/api/recipes/?page=2"));
    }

    #[test]
    fn limit_is_capped() {
        let query = PageQuery {
            page: None,
            limit: Some(10_000),
        };
        assert_eq!(query.limit(PageSize(6)), MAX_PAGE_SIZE);
    }

    #[test]
    fn links_keep_other_parameters() {
        let link = page_link(&uri("/api/recipes/?tags=lunch&page=2&tags=dinner"), 3);
        assert_eq!(link, "/api/recipes/?tags=lunch&tags=dinner&page=3");
    }

    #[test]
    fn link_to_first_page_drops_page_parameter() {
        assert_eq!(page_link(&uri("/api/users/?page=2"), 1), "/api/users/");
    }

    #[test]
    fn middle_page_has_both_links() {
        let query = PageQuery {
            page: Some(2),
            limit: Some(2),
        };
        let page = Page::from_rows(vec![3, 4], 5, &query, PageSize(6), &uri("/api/users/?page=2&limit=2"));

        assert_eq!(page.next.as_deref(), Some("/api/users/?limit=2&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2"));
    }

    #[test]
    fn single_page_has_no_links() {
        let page = Page::from_rows(vec![1], 1, &PageQuery::default(), PageSize(6), &uri("/api/users/"));
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
