//! Page-number pagination over eagerly evaluated listings.
//!
//! Page numbers come straight from the `page` query parameter and are clamped
//! instead of rejected: missing or non-numeric input selects the first page,
//! numbers below one select the first page, and numbers past the end (including
//! values too large to parse) select the last page. An empty listing still has
//! exactly one, empty, page.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A requested page number as supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageNumber {
    #[default]
    First,
    Exact(u64),
    Last,
}

impl PageNumber {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return PageNumber::First;
        };

        match value.parse::<i64>() {
            Ok(number) if number < 1 => PageNumber::First,
            Ok(number) => PageNumber::Exact(number as u64),
            Err(_) if is_integer_literal(value) => {
                if value.starts_with('-') {
                    PageNumber::First
                } else {
                    PageNumber::Last
                }
            }
            Err(_) => PageNumber::First,
        }
    }
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Fixed-size page arithmetic for a listing of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    total: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total: u64, per_page: u32) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn num_pages(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(u64::from(self.per_page))
        }
    }

    /// Clamp a requested page to a valid 1-based page number.
    pub fn resolve(&self, requested: PageNumber) -> u64 {
        match requested {
            PageNumber::First => 1,
            PageNumber::Last => self.num_pages(),
            PageNumber::Exact(number) => number.clamp(1, self.num_pages()),
        }
    }

    /// Window for a resolved page number.
    pub fn window(&self, number: u64) -> PageWindow {
        let number = number.clamp(1, self.num_pages());
        PageWindow {
            number,
            offset: (number - 1) * u64::from(self.per_page),
            limit: self.per_page,
        }
    }
}

/// Limit/offset window selected by a [`Paginator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub offset: u64,
    pub limit: u32,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u64, paginator: &Paginator) -> Self {
        Self {
            items,
            number,
            num_pages: paginator.num_pages(),
            total_count: paginator.total(),
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            num_pages: 1,
            total_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> u64 {
        self.number.saturating_add(1).min(self.num_pages)
    }

    pub fn previous_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total_count,
        }
    }
}
