//! Pagination and sort resolution.
//!
//! Always produces a usable [`PageSpec`]: bad page numbers clamp, unknown sort fields fall
//! back to the default, and the unique `id` tie-break is appended so ordering is total and
//! pages never overlap or skip records that share a primary sort value.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::filter::{keys, RawParams};
use crate::listing::Listing;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Id,
    Price,
    Year,
    Mileage,
    ListedAt,
    Make,
}

impl SortField {
    /// Query-string spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Price => "price",
            SortField::Year => "year",
            SortField::Mileage => "mileage",
            SortField::ListedAt => "listedAt",
            SortField::Make => "make",
        }
    }

    /// Direction used when the caller names a field without one.
    pub fn natural_direction(self) -> SortDirection {
        match self {
            SortField::ListedAt => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    fn compare(self, a: &Listing, b: &Listing) -> Ordering {
        match self {
            SortField::Id => a.id.cmp(&b.id),
            SortField::Price => a.price.cmp(&b.price),
            SortField::Year => a.year.cmp(&b.year),
            SortField::Mileage => a.mileage.cmp(&b.mileage),
            SortField::ListedAt => a.listed_at.cmp(&b.listed_at),
            SortField::Make => a.make.to_lowercase().cmp(&b.make.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        let ord = self.field.compare(a, b);
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Sort fields a caller may choose from, plus the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortFields {
    known: Vec<SortField>,
    default: SortKey,
}

impl SortFields {
    pub fn new(known: impl IntoIterator<Item = SortField>, default: SortKey) -> Self {
        Self { known: known.into_iter().collect(), default }
    }

    pub fn default_key(&self) -> SortKey {
        self.default
    }

    fn lookup(&self, name: &str) -> Option<SortField> {
        self.known.iter().copied().find(|f| f.as_str().eq_ignore_ascii_case(name))
    }
}

impl Default for SortFields {
    fn default() -> Self {
        Self::new(
            [SortField::Price, SortField::Year, SortField::Mileage, SortField::ListedAt, SortField::Make],
            SortKey::new(SortField::ListedAt, SortDirection::Desc),
        )
    }
}

/// Resolved page request. Invariant: `page >= 1`, `1 <= page_size <= MAX_PAGE_SIZE`, and the
/// tie-break key is the unique `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpec {
    page: u32,
    page_size: u32,
    sort: SortKey,
    tie_break: SortKey,
}

impl PageSpec {
    /// Build a spec, clamping `page` and `page_size` into range.
    pub fn new(page: u32, page_size: u32, sort: SortKey) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            sort,
            tie_break: SortKey::new(SortField::Id, SortDirection::Asc),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn tie_break(&self) -> SortKey {
        self.tie_break
    }

    /// Primary key followed by the tie-break.
    pub fn sort_keys(&self) -> [SortKey; 2] {
        [self.sort, self.tie_break]
    }

    /// Number of records preceding this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1).saturating_mul(u64::from(self.page_size))
    }

    /// Total order over listings implied by this spec.
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        self.sort.compare(a, b).then_with(|| self.tie_break.compare(a, b))
    }
}

/// Resolve paging parameters from the raw request.
pub fn resolve(raw: &RawParams, sort_fields: &SortFields) -> PageSpec {
    let page = raw
        .first(keys::PAGE)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, i64::from(u32::MAX)) as u32)
        .unwrap_or(1);
    let page_size = raw
        .first(keys::PAGE_SIZE)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let sort = raw
        .first(keys::SORT)
        .and_then(|v| parse_sort(v, sort_fields))
        .unwrap_or_else(|| sort_fields.default_key());

    PageSpec::new(page, page_size, sort)
}

/// Accepts `field`, `-field` and `field:asc|desc`.
fn parse_sort(value: &str, sort_fields: &SortFields) -> Option<SortKey> {
    let value = value.trim();
    let (name, direction) = if let Some(name) = value.strip_prefix('-') {
        (name, Some(SortDirection::Desc))
    } else if let Some((name, dir)) = value.split_once(':') {
        let direction = match dir.trim().to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => {
                debug!(target: "forecourt::paging", sort = value, "unknown sort direction");
                return None;
            }
        };
        (name, Some(direction))
    } else {
        (value, None)
    };

    let Some(field) = sort_fields.lookup(name.trim()) else {
        debug!(target: "forecourt::paging", sort = value, "unknown sort field, using default");
        return None;
    };
    Some(SortKey::new(field, direction.unwrap_or_else(|| field.natural_direction())))
}
