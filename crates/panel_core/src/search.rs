use serde::Serialize;
use shared::{model::Params, protocol::ListPage};
use storage::{Direction, Query, Repository};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter form for an entity listing.
///
/// Only `SAFE_FIELDS` are read from the request. `apply` narrows a query
/// with the "and filter where" rule: a blank criterion adds no condition.
pub trait Criteria: Default + Serialize + Clone + Send + Sync + 'static {
    const SAFE_FIELDS: &'static [&'static str];
    /// Columns a listing may be ordered by. The first is the default.
    const SORTABLE: &'static [&'static str];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String>;
    fn apply(&self, query: Query) -> Query;
}

/// Binds `raw` onto fresh criteria and builds the listing query.
///
/// When any criterion fails to parse the base query is returned unfiltered,
/// so a malformed filter lists everything rather than nothing.
pub fn search<C: Criteria>(raw: &Params) -> (C, Query) {
    let mut criteria = C::default();
    let mut valid = true;
    for field in C::SAFE_FIELDS {
        let Some(value) = raw.get(*field) else {
            continue;
        };
        if let Err(message) = criteria.assign(field, value.trim()) {
            debug!(field, %message, "search criterion rejected");
            valid = false;
        }
    }
    if !valid {
        return (criteria, Query::new());
    }
    let query = criteria.apply(Query::new());
    (criteria, query)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn from_params(raw: &Params) -> Self {
        let page = raw
            .get("page")
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let per_page = raw
            .get("per_page")
            .and_then(|p| p.trim().parse::<u32>().ok())
            .map(|p| p.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, per_page }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn page_count(&self, total: u64) -> u32 {
        let pages = total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub direction: Direction,
}

impl Sort {
    /// Reads `sort=field` or `sort=-field`. Unknown columns fall back to
    /// `-<first sortable>`.
    pub fn from_params(raw: &Params, sortable: &'static [&'static str]) -> Option<Self> {
        let fallback = sortable.first().map(|column| Sort {
            column,
            direction: Direction::Desc,
        });
        let Some(requested) = raw.get("sort").map(|s| s.trim()) else {
            return fallback;
        };
        let (name, direction) = match requested.strip_prefix('-') {
            Some(name) => (name, Direction::Desc),
            None => (requested, Direction::Asc),
        };
        sortable
            .iter()
            .find(|column| **column == name)
            .map(|column| Sort { column, direction })
            .or(fallback)
    }

    pub fn as_param(&self) -> String {
        match self.direction {
            Direction::Asc => self.column.to_string(),
            Direction::Desc => format!("-{}", self.column),
        }
    }
}

/// A query plus the window and order to read it with.
pub struct DataProvider<'a, R: Repository> {
    repo: &'a R,
    query: Query,
    pagination: Pagination,
    sort: Option<Sort>,
}

impl<'a, R: Repository> DataProvider<'a, R> {
    pub fn new(repo: &'a R, query: Query, pagination: Pagination, sort: Option<Sort>) -> Self {
        Self {
            repo,
            query,
            pagination,
            sort,
        }
    }

    pub fn from_params<C: Criteria>(repo: &'a R, query: Query, raw: &Params) -> Self {
        Self::new(
            repo,
            query,
            Pagination::from_params(raw),
            Sort::from_params(raw, C::SORTABLE),
        )
    }

    pub async fn fetch(&self) -> anyhow::Result<ListPage<R::Record>> {
        let total = self.repo.count(&self.query).await?;
        let mut window = self.query.clone();
        if let Some(sort) = self.sort {
            window = window.order_by(sort.column, sort.direction);
        }
        let window = window
            .limit(self.pagination.per_page)
            .offset(self.pagination.offset());
        let items = self.repo.find_all(&window).await?;
        Ok(ListPage {
            items,
            total,
            page: self.pagination.page,
            per_page: self.pagination.per_page,
            page_count: self.pagination.page_count(total),
            sort: self.sort.map(|s| s.as_param()).unwrap_or_default(),
        })
    }
}
