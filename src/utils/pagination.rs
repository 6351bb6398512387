use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: usize = 25;
pub const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
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
        Self { page, per_page }.clamp()
    }

    /// 頁碼從 1 開始；每頁筆數上限 MAX_PER_PAGE
    pub fn clamp(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let request = request.clamp();
    let total = items.len();
    let total_pages = total.div_ceil(request.per_page);

    let items = items
        .into_iter()
        .skip(request.offset())
        .take(request.per_page)
        .collect();

    Page {
        items,
        page: request.page,
        per_page: request.per_page,
        total,
        total_pages,
    }
}
