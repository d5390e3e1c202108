use askama_actix::Template;
use serde::Deserialize;

/// Posts per list page.
pub const POSTS_PER_PAGE: u64 = 10;

const PAGINATOR_LOOK_AHEAD: u64 = 2;

/// `?page=` as sent by the browser. Kept as text so garbage falls back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested 1-based page, or 1 when missing or unparseable.
    pub fn requested(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

/// One slot in the page link strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLink {
    Page(u64),
    Gap,
}

/// A rendered slot: `url` is `None` for gaps and for the current page.
#[derive(Clone, Debug)]
pub struct PageItem {
    pub label: String,
    pub url: Option<String>,
    pub current: bool,
}

/// 1 2 [3] 4 5 ... 13
/// 1 ... 4 5 [6] 7 8 ... 13
/// 1 ... 9 10 [11] 12 13
#[derive(Clone, Debug)]
pub struct Paginator {
    pub base_url: String,
    pub this_page: u64,
    pub page_count: u64,
    pub item_count: u64,
}

#[derive(Template)]
#[template(path = "includes/paginator.html")]
struct PaginatorTemplate<'a> {
    paginator: &'a Paginator,
}

impl Paginator {
    /// Clamps `requested` into `1..=page_count`; an empty result set still has one page.
    pub fn new(base_url: &str, requested: u64, item_count: u64, per_page: u64) -> Self {
        let page_count = ((item_count + per_page - 1) / per_page).max(1);
        Self {
            base_url: base_url.to_owned(),
            this_page: requested.clamp(1, page_count),
            page_count,
            item_count,
        }
    }

    pub fn has_pages(&self) -> bool {
        self.page_count > 1
    }

    pub fn has_previous(&self) -> bool {
        self.this_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.this_page < self.page_count
    }

    pub fn previous(&self) -> u64 {
        self.this_page.saturating_sub(1).max(1)
    }

    pub fn next(&self) -> u64 {
        (self.this_page + 1).min(self.page_count)
    }

    pub fn previous_url(&self) -> Option<String> {
        self.has_previous().then(|| self.url_for(self.previous()))
    }

    pub fn next_url(&self) -> Option<String> {
        self.has_next().then(|| self.url_for(self.next()))
    }

    /// Zero-based index for the ORM paginator.
    pub fn index(&self) -> u64 {
        self.this_page - 1
    }

    pub fn url_for(&self, page: u64) -> String {
        format!("{}?page={}", self.base_url, page)
    }

    /// First page, a window around the current page, last page, with gaps between.
    pub fn links(&self) -> Vec<PageLink> {
        let start = self.this_page.saturating_sub(PAGINATOR_LOOK_AHEAD).max(1);
        let end = (self.this_page + PAGINATOR_LOOK_AHEAD).min(self.page_count);
        let mut links = Vec::new();

        if start > 1 {
            links.push(PageLink::Page(1));
            if start > 2 {
                links.push(PageLink::Gap);
            }
        }
        links.extend((start..=end).map(PageLink::Page));
        if end < self.page_count {
            if end + 1 < self.page_count {
                links.push(PageLink::Gap);
            }
            links.push(PageLink::Page(self.page_count));
        }

        links
    }

    pub fn items(&self) -> Vec<PageItem> {
        self.links()
            .into_iter()
            .map(|link| match link {
                PageLink::Page(n) => PageItem {
                    label: n.to_string(),
                    url: (n != self.this_page).then(|| self.url_for(n)),
                    current: n == self.this_page,
                },
                PageLink::Gap => PageItem {
                    label: "…".to_owned(),
                    url: None,
                    current: false,
                },
            })
            .collect()
    }

    pub fn as_html(&self) -> String {
        if !self.has_pages() {
            return String::new();
        }

        let mut buffer = String::new();
        let template = PaginatorTemplate { paginator: self };
        if template.render_into(&mut buffer).is_err() {
            "[Paginator Util Error]".to_owned()
        } else {
            buffer
        }
    }
}

/// A slice of a result set together with its paginator.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paginator: Paginator,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(this_page: u64, page_count: u64) -> Vec<PageLink> {
        Paginator::new("/", this_page, page_count * 10, 10).links()
    }

    #[test]
    fn test_page_count() {
        assert_eq!(Paginator::new("/", 1, 0, 10).page_count, 1);
        assert_eq!(Paginator::new("/", 1, 10, 10).page_count, 1);
        assert_eq!(Paginator::new("/", 1, 11, 10).page_count, 2);
    }

    #[test]
    fn test_requested_page_is_clamped() {
        assert_eq!(Paginator::new("/", 99, 25, 10).this_page, 3);
        assert_eq!(Paginator::new("/", 0, 25, 10).this_page, 1);
    }

    #[test]
    fn test_page_query_is_lenient() {
        let query = |p: &str| PageQuery {
            page: Some(p.to_owned()),
        };

        assert_eq!(PageQuery::default().requested(), 1);
        assert_eq!(query("abc").requested(), 1);
        assert_eq!(query("0").requested(), 1);
        assert_eq!(query("-2").requested(), 1);
        assert_eq!(query(" 4 ").requested(), 4);
    }

    #[test]
    fn test_links() {
        use PageLink::{Gap, Page as P};

        assert_eq!(pages(1, 1), vec![P(1)]);
        assert_eq!(pages(1, 13), vec![P(1), P(2), P(3), Gap, P(13)]);
        assert_eq!(pages(3, 13), vec![P(1), P(2), P(3), P(4), P(5), Gap, P(13)]);
        assert_eq!(pages(6, 13), vec![P(1), Gap, P(4), P(5), P(6), P(7), P(8), Gap, P(13)]);
        assert_eq!(pages(11, 13), vec![P(1), Gap, P(9), P(10), P(11), P(12), P(13)]);
        assert_eq!(pages(13, 13), vec![P(1), Gap, P(11), P(12), P(13)]);
        assert_eq!(pages(4, 5), vec![P(1), P(2), P(3), P(4), P(5)]);
    }

    #[test]
    fn test_neighbours() {
        let p = Paginator::new("/category/travel/", 2, 30, 10);
        assert!(p.has_previous() && p.has_next());
        assert_eq!(p.previous(), 1);
        assert_eq!(p.next(), 3);
        assert_eq!(p.index(), 1);
        assert_eq!(p.url_for(3), "/category/travel/?page=3");
        assert_eq!(p.next_url().as_deref(), Some("/category/travel/?page=3"));

        let first = Paginator::new("/", 1, 30, 10);
        assert_eq!(first.previous_url(), None);
        let current: Vec<_> = first.items().into_iter().filter(|i| i.current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].label, "1");
        assert!(current[0].url.is_none());
    }
}
