//! Page arithmetic and page links for list views.

use serde::Serialize;
use tool_shared::{Result, ToolError};

use crate::context::RequestContext;
use crate::routing::RouteArgs;

/// Splits `count` items into pages of `per_page`, 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    count: u64,
    per_page: u64,
    page: u64,
    endpoint: String,
    args: RouteArgs,
}

/// Everything a template needs to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLinks {
    pub page: u64,
    pub pages: u64,
    pub count: u64,
    pub per_page: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub first: String,
    pub last: String,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl Pagination {
    /// `page` is clamped to `1..=pages()`.
    pub fn new(count: u64, per_page: u64, page: u64, endpoint: &str) -> Result<Self> {
        if per_page == 0 {
            return Err(ToolError::validation("per_page must be positive"));
        }
        let mut pagination = Self {
            count,
            per_page,
            page: 1,
            endpoint: endpoint.to_string(),
            args: RouteArgs::new(),
        };
        pagination.page = page.clamp(1, pagination.pages());
        Ok(pagination)
    }

    /// Extra URL arguments used when building page links.
    pub fn with_args(mut self, args: RouteArgs) -> Self {
        self.args = args;
        self
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn pages(&self) -> u64 {
        self.count.saturating_sub(1) / self.per_page + 1
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    /// Number of items to skip for the current page.
    pub fn offset(&self) -> u64 {
        self.per_page.saturating_mul(self.page - 1)
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    /// URL of `page`: the endpoint's URL if it can be built with a `page`
    /// argument, a bare `?page=N` otherwise.
    pub fn page_url(&self, cx: &RequestContext, page: u64) -> String {
        let args = self.args.clone().with("page", i64::try_from(page).unwrap_or(i64::MAX));
        cx.url_for(&self.endpoint, &args)
            .unwrap_or_else(|_| format!("?page={page}"))
    }

    pub fn links(&self, cx: &RequestContext) -> PageLinks {
        PageLinks {
            page: self.page,
            pages: self.pages(),
            count: self.count,
            per_page: self.per_page,
            has_previous: self.has_previous(),
            has_next: self.has_next(),
            first: self.page_url(cx, 1),
            last: self.page_url(cx, self.pages()),
            previous: self
                .has_previous()
                .then(|| self.page_url(cx, self.page - 1)),
            next: self.has_next().then(|| self.page_url(cx, self.page + 1)),
        }
    }
}
