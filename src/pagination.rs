//! Page-number pagination with absolute `next`/`previous` links.

use crate::domain::{Paged, Window};
use crate::query::QueryParams;
use serde::Serialize;

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Same links and count around rendered results.
    pub fn with_results<U>(self, results: Vec<U>) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results,
        }
    }
}

impl PageRequest {
    /// A malformed `limit` falls back to the default; a malformed `page` is an error.
    pub fn from_query(params: &QueryParams, default_limit: usize) -> Result<Self, InvalidPage> {
        let limit = params
            .get(LIMIT_PARAM)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit);
        let page = match params.get(PAGE_PARAM) {
            None => 1,
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|page| *page > 0)
                .ok_or(InvalidPage)?,
        };
        Ok(Self { page, limit })
    }

    pub fn window(&self) -> Window {
        Window {
            limit: self.limit,
            offset: (self.page - 1).saturating_mul(self.limit),
        }
    }

    pub fn num_pages(&self, count: usize) -> usize {
        count.div_ceil(self.limit).max(1)
    }

    /// Wraps a fetched page, rejecting pages past the end.
    ///
    /// `url` is the absolute request URL without its query string.
    pub fn paginate<T>(
        &self,
        paged: Paged<T>,
        url: &str,
        params: &QueryParams,
    ) -> Result<Page<T>, InvalidPage> {
        let num_pages = self.num_pages(paged.count);
        if self.page > num_pages {
            return Err(InvalidPage);
        }
        let link = |query: String| {
            if query.is_empty() {
                url.to_string()
            } else {
                format!("{url}?{query}")
            }
        };
        let next = (self.page < num_pages)
            .then(|| link(params.with(PAGE_PARAM, &(self.page + 1).to_string())));
        let previous = match self.page {
            1 => None,
            2 => Some(link(params.without(PAGE_PARAM))),
            page => Some(link(params.with(PAGE_PARAM, &(page - 1).to_string()))),
        };
        Ok(Page {
            count: paged.count,
            next,
            previous,
            results: paged.items,
        })
    }
}
