//! Page-number window for list views.
//!
//! At most `max_page_controls` controls are produced: up to three pages before the current
//! one, the current page, as many following pages as the budget allows, and if the end of
//! the list cuts the forward pass short, the leftover budget goes back to earlier pages.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub const DEFAULT_MAX_PAGE_CONTROLS: usize = 7;
const HISTORY_CONTROLS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page {0} has no page control")]
    PageNotFound(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageControl {
    pub number: usize,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Pagination<T> {
    pub rows: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub count: usize,
    pub page_controls: Vec<PageControl>,
    pub max_page_controls: usize,
}

/// Whether `page` still holds at least one row, allowing for a partially filled last page.
fn page_exists(page: usize, page_size: usize, count: usize) -> bool {
    let end = page.saturating_mul(page_size);
    end <= count || end - count < page_size
}

/// Page numbers of the control window, ascending.
pub fn page_numbers(page: usize, page_size: usize, count: usize, max_controls: usize) -> Vec<usize> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let mut remaining = max_controls;
    let mut pages = Vec::with_capacity(max_controls);

    fn add(p: usize, remaining: &mut usize, pages: &mut Vec<usize>) {
        *remaining = remaining.saturating_sub(1);
        pages.push(p);
    }

    let start = page.saturating_sub(remaining.min(HISTORY_CONTROLS));
    for p in start..page {
        if p > 0 {
            add(p, &mut remaining, &mut pages);
        }
    }

    add(page, &mut remaining, &mut pages);

    let end = page.saturating_add(remaining).saturating_add(1);
    for p in page.saturating_add(1)..end {
        if page_exists(p, page_size, count) {
            add(p, &mut remaining, &mut pages);
        }
    }

    // unused budget after a short forward pass goes to older pages
    let lo = page.saturating_sub(remaining + HISTORY_CONTROLS);
    let hi = page.saturating_sub(HISTORY_CONTROLS);
    for p in lo..hi {
        if p > 0 {
            add(p, &mut remaining, &mut pages);
        }
    }

    pages.sort_unstable();
    pages
}

/// Returns `base_url` with its `page` query parameter set to `page`, other parameters kept.
pub fn page_url(base_url: &str, page: usize) -> String {
    let (path, query) = match base_url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (base_url, ""),
    };
    let mut pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
    pairs.retain(|(k, _)| k != "page");
    pairs.push(("page".to_string(), page.to_string()));
    match serde_urlencoded::to_string(&pairs) {
        Ok(query) => format!("{}?{}", path, query),
        Err(_) => format!("{}?page={}", path, page),
    }
}

impl<T> Pagination<T> {
    pub fn new(rows: Vec<T>, page: usize, page_size: usize, count: usize) -> Self {
        Pagination {
            rows,
            page: page.max(1),
            page_size: page_size.max(1),
            count,
            page_controls: Vec::new(),
            max_page_controls: DEFAULT_MAX_PAGE_CONTROLS,
        }
    }

    pub fn with_max_page_controls(mut self, max_page_controls: usize) -> Self {
        self.max_page_controls = max_page_controls;
        self
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        page_exists(self.page.saturating_add(1), self.page_size, self.count)
    }

    pub fn total_pages(&self) -> usize {
        self.count.div_ceil(self.page_size)
    }

    pub fn add_pagination_urls(&mut self, base_url: &str) {
        self.page_controls = page_numbers(self.page, self.page_size, self.count, self.max_page_controls)
            .into_iter()
            .map(|number| PageControl { number, url: page_url(base_url, number) })
            .collect();
    }

    pub fn previous_page(&self) -> Result<&PageControl, PaginationError> {
        self.control(self.page - 1)
    }

    pub fn next_page(&self) -> Result<&PageControl, PaginationError> {
        let next = self.page.checked_add(1).ok_or(PaginationError::PageNotFound(self.page))?;
        self.control(next)
    }

    /// Clamps a 1-based index among all pages into `[1, total_pages]`.
    pub fn new_page_number(&self, display_index: usize) -> usize {
        display_index.clamp(1, self.total_pages().max(1))
    }

    fn control(&self, number: usize) -> Result<&PageControl, PaginationError> {
        self.page_controls
            .iter()
            .find(|c| c.number == number)
            .ok_or(PaginationError::PageNotFound(number))
    }

    pub fn map_rows<U>(self, f: impl FnMut(T) -> U) -> Pagination<U> {
        Pagination {
            rows: self.rows.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            count: self.count,
            page_controls: self.page_controls,
            max_page_controls: self.max_page_controls,
        }
    }
}
