use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// `?page=&perPage=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Cut one page out of a full result set. A page past the end is
    /// clamped to the last page.
    pub fn paginate(all: Vec<T>, req: PageRequest) -> Self {
        let req = req.clamped();
        let total = all.len();
        let last = total.div_ceil(req.per_page).max(1);
        let page = req.page.min(last);
        let offset = (page - 1) * req.per_page;
        let items = all.into_iter().skip(offset).take(req.per_page).collect();
        Page {
            items,
            page,
            per_page: req.per_page,
            total,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1)).max(1)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page() {
        let page = Page::paginate((1..=25).collect(), PageRequest::default());
        assert_eq!(page.items, (1..=10).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages(), 3);
        assert!(!page.has_prev());
        assert!(page.has_next());
    }

    #[test]
    fn last_partial_page() {
        let page = Page::paginate((1..=25).collect(), PageRequest::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert!(page.has_prev());
        assert!(!page.has_next());
    }

    #[test]
    fn out_of_range_is_clamped() {
        let page = Page::paginate((1..=5).collect(), PageRequest::new(9, 2));
        assert_eq!(page.page, 3);
        assert_eq!(page.items, vec![5]);

        let page = Page::paginate(Vec::<i32>::new(), PageRequest::new(0, 0));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.total_pages(), 1);
        assert!(page.is_empty());
    }

    #[test]
    fn middle_page_skips_earlier_rows() {
        let page = Page::paginate((1..=100).collect(), PageRequest::new(4, 20));
        assert_eq!(page.items.first(), Some(&61));
        assert_eq!(page.items.len(), 20);
    }
}
