use serde::Deserialize;
use yatube_shared::Page;

/// Posts per feed page.
pub const PAGE_SIZE: i64 = 10;

/// `?page=` as sent by the client. Kept as a string so that garbage
/// degrades to the first page instead of a 400.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

impl PageParams {
    pub fn requested(&self) -> Option<&str> {
        self.page.as_deref()
    }
}

/// Resolves a requested page against a known item count.
///
/// A missing or non-numeric page number gives the first page; a number
/// outside `1..=num_pages` gives the last page. An empty collection still
/// has one (empty) page.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Paginator {
    count: i64,
    per_page: i64,
    number: i64,
    num_pages: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64, requested: Option<&str>) -> Self {
        let count = count.max(0);
        let per_page = per_page.max(1);
        let num_pages = if count == 0 {
            1
        } else {
            (count + per_page - 1) / per_page
        };

        let number = match requested.and_then(|raw| raw.trim().parse::<i64>().ok()) {
            None => 1,
            Some(n) if (1..=num_pages).contains(&n) => n,
            Some(_) => num_pages,
        };

        Self {
            count,
            per_page,
            number,
            num_pages,
        }
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    /// Wraps the rows fetched with [`limit`](Self::limit) and
    /// [`offset`](Self::offset).
    pub fn page<T>(&self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            count: self.count,
            number: self.number,
            num_pages: self.num_pages,
            has_next: self.number < self.num_pages,
            has_previous: self.number > 1,
        }
    }
}
