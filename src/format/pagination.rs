use axum::http::{HeaderMap, HeaderValue};

/// 每页条数默认10，上限100
pub fn clamp_pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(10).clamp(1, 100);
    (page, per_page)
}

pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if total == 0 { 0 } else { (total + per_page - 1) / per_page }
}

/// WordPress分页头：X-WP-Total、X-WP-TotalPages，
/// 外加RFC5988 Link头：第一页没有prev，最后一页没有next
pub fn pagination_headers(
    collection_url: &str,
    page: i64,
    per_page: i64,
    total: i64,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let pages = total_pages(total, per_page);

    if let Ok(value) = HeaderValue::from_str(&total.to_string()) {
        headers.insert("X-WP-Total", value);
    }
    if let Ok(value) = HeaderValue::from_str(&pages.to_string()) {
        headers.insert("X-WP-TotalPages", value);
    }

    let mut relations = Vec::new();
    if page > 1 {
        relations.push(format!(
            "<{}?page={}&per_page={}>; rel=\"prev\"",
            collection_url,
            page - 1,
            per_page
        ));
    }
    if page < pages {
        relations.push(format!(
            "<{}?page={}&per_page={}>; rel=\"next\"",
            collection_url,
            page + 1,
            per_page
        ));
    }
    if !relations.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&relations.join(", ")) {
            headers.insert("Link", value);
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(30, 10), 3);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
    }

    #[test]
    fn middle_page_has_both_relations() {
        // 25条、每页10、第2页：prev指向1，next指向3
        let headers = pagination_headers("http://b.example/wp-json/wp/v2/posts", 2, 10, 25);
        assert_eq!(headers.get("X-WP-Total").unwrap(), "25");
        assert_eq!(headers.get("X-WP-TotalPages").unwrap(), "3");
        let link = headers.get("Link").unwrap().to_str().unwrap();
        assert!(link.contains("page=1&per_page=10>; rel=\"prev\""));
        assert!(link.contains("page=3&per_page=10>; rel=\"next\""));
    }

    #[test]
    fn first_page_has_no_prev() {
        let headers = pagination_headers("http://b.example/wp-json/wp/v2/posts", 1, 10, 25);
        let link = headers.get("Link").unwrap().to_str().unwrap();
        assert!(!link.contains("rel=\"prev\""));
        assert!(link.contains("rel=\"next\""));
    }

    #[test]
    fn last_page_has_no_next() {
        let headers = pagination_headers("http://b.example/wp-json/wp/v2/posts", 3, 10, 25);
        let link = headers.get("Link").unwrap().to_str().unwrap();
        assert!(link.contains("rel=\"prev\""));
        assert!(!link.contains("rel=\"next\""));
    }

    #[test]
    fn single_page_has_no_link_header() {
        let headers = pagination_headers("http://b.example/wp-json/wp/v2/posts", 1, 10, 5);
        assert!(headers.get("Link").is_none());
    }

    #[test]
    fn clamp_defaults() {
        assert_eq!(clamp_pagination(None, None), (1, 10));
        assert_eq!(clamp_pagination(Some(0), Some(1000)), (1, 100));
        assert_eq!(clamp_pagination(Some(2), Some(25)), (2, 25));
    }
}
