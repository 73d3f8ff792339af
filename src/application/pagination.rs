//! Page-number pagination shared by every post listing.
//!
//! Listings are fixed at [`POSTS_PER_PAGE`] items. Requested page numbers are
//! clamped the way a forgiving paginator does: anything missing, malformed or
//! below one resolves to the first page, anything past the end resolves to the
//! last page. An empty listing still has one (empty) page.

use serde::Serialize;

pub const POSTS_PER_PAGE: u32 = 10;

/// Raw `?page=` value as requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(u32);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    pub fn new(value: u32) -> Self {
        Self(value.max(1))
    }

    /// Parse a query value, falling back to the first page.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<u32>().ok())
            .map(Self::new)
            .unwrap_or(Self::FIRST)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u64,
}

/// Resolved position inside a listing of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u32,
    total: u64,
}

impl Paginator {
    pub fn new(total: u64) -> Self {
        Self::with_page_size(total, POSTS_PER_PAGE)
    }

    pub fn with_page_size(total: u64, per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
            total,
        }
    }

    pub fn num_pages(&self) -> u32 {
        if self.total == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Clamp the requested page into `1..=num_pages`.
    pub fn resolve(&self, requested: PageNumber) -> u32 {
        requested.get().min(self.num_pages())
    }

    pub fn window(&self, number: u32) -> PageWindow {
        let number = number.clamp(1, self.num_pages());
        PageWindow {
            limit: self.per_page,
            offset: u64::from(number - 1) * u64::from(self.per_page),
        }
    }

    pub fn page<T>(&self, number: u32, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total: self.total,
        }
    }
}

/// One page of a listing, mirroring what templates need to render a paginator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_page_number(&self) -> u32 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> u32 {
        (self.number + 1).min(self.num_pages)
    }

    /// Page numbers to link from the paginator.
    pub fn page_range(&self) -> Vec<u32> {
        (1..=self.num_pages).collect()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}
