//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Raw query parameters go through [`ListParams::parse`], which rejects bad
//! input before any SQL is built. The resulting [`TransactionFilter`] is
//! shared by the list query, its count query and the aggregations.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::TransactionType;

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Columns a listing may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Date,
    Amount,
    Merchant,
    Category,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Amount => "amount",
            Self::Merchant => "merchant",
            Self::Category => "category",
            Self::CreatedAt => "created_at",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Date => "t.date",
            // Stored as decimal text; compare numerically
            Self::Amount => "CAST(t.amount AS REAL)",
            Self::Merchant => "t.merchant COLLATE NOCASE",
            Self::Category => "t.category COLLATE NOCASE",
            Self::CreatedAt => "t.created_at",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "amount" => Ok(Self::Amount),
            "merchant" => Ok(Self::Merchant),
            "category" => Ok(Self::Category),
            "created_at" => Ok(Self::CreatedAt),
            _ => Err(Error::InvalidSort(format!(
                "unknown sort key '{}' (expected date, amount, merchant, category or created_at)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(Error::InvalidSort(format!(
                "unknown sort order '{}' (expected asc or desc)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    /// ORDER BY clause; ties fall back to newest id first
    pub fn order_clause(&self) -> String {
        let dir = match self.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        format!("ORDER BY {} {}, t.id DESC", self.field.column(), dir)
    }
}

/// Offset/limit window, already clamped to the maximum page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(offset: Option<i64>, limit: Option<i64>, max_page_size: i64) -> Result<Self> {
        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(Error::InvalidFilter("offset cannot be negative".into()));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE.min(max_page_size));
        if limit < 1 {
            return Err(Error::InvalidFilter("limit must be at least 1".into()));
        }
        Ok(Self {
            offset,
            limit: limit.min(max_page_size),
        })
    }
}

/// Conjunctive transaction filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    /// Exact match, case-insensitive
    pub category: Option<String>,
    /// Substring match, case-insensitive
    pub merchant: Option<String>,
    pub currency: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Substring match across merchant, description, category and reference number
    pub search: Option<String>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword (empty if no conditions)
    pub where_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl TransactionFilter {
    /// Create a new filter builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_type(mut self, t: Option<TransactionType>) -> Self {
        self.transaction_type = t;
        self
    }

    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = non_blank(category);
        self
    }

    pub fn merchant(mut self, merchant: Option<&str>) -> Self {
        self.merchant = non_blank(merchant);
        self
    }

    pub fn currency(mut self, currency: Option<&str>) -> Self {
        self.currency = non_blank(currency).map(|c| c.to_uppercase());
        self
    }

    /// Set inclusive date bounds
    pub fn date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn search(mut self, query: Option<&str>) -> Self {
        self.search = non_blank(query);
        self
    }

    /// Reject ranges that can never match
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(Error::InvalidFilter(format!(
                    "date_from {} is after date_to {}",
                    from, to
                )));
            }
        }
        Ok(())
    }

    /// Build the filter components
    pub fn build(&self) -> FilterResult {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(t) = self.transaction_type {
            conditions.push("t.transaction_type = ?".to_string());
            params.push(Box::new(t.as_str()));
        }

        if let Some(ref category) = self.category {
            conditions.push("t.category = ? COLLATE NOCASE".to_string());
            params.push(Box::new(category.clone()));
        }

        if let Some(ref merchant) = self.merchant {
            conditions.push("t.merchant LIKE ? ESCAPE '\\'".to_string());
            params.push(Box::new(like_pattern(merchant)));
        }

        if let Some(ref currency) = self.currency {
            conditions.push("t.currency = ?".to_string());
            params.push(Box::new(currency.clone()));
        }

        if let Some(from) = self.date_from {
            conditions.push("t.date >= ?".to_string());
            params.push(Box::new(from.to_string()));
        }

        if let Some(to) = self.date_to {
            conditions.push("t.date <= ?".to_string());
            params.push(Box::new(to.to_string()));
        }

        if let Some(ref q) = self.search {
            conditions.push(
                "(t.merchant LIKE ? ESCAPE '\\' OR t.description LIKE ? ESCAPE '\\' \
                  OR t.category LIKE ? ESCAPE '\\' OR t.reference_number LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = like_pattern(q);
            for _ in 0..4 {
                params.push(Box::new(pattern.clone()));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        FilterResult {
            where_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Get the owned parameter vector to append pagination params
    pub fn into_params(self) -> Vec<Box<dyn rusqlite::ToSql>> {
        self.params
    }
}

/// Raw listing parameters as they arrive on the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "type", alias = "transaction_type")]
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub currency: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    /// Validate every parameter and split into filter, sort and page
    pub fn parse(&self, max_page_size: i64) -> Result<(TransactionFilter, Sort, Page)> {
        let transaction_type = parse_type(self.transaction_type.as_deref())?;
        let date_from = parse_date_param("date_from", self.date_from.as_deref())?;
        let date_to = parse_date_param("date_to", self.date_to.as_deref())?;

        let filter = TransactionFilter::new()
            .transaction_type(transaction_type)
            .category(self.category.as_deref())
            .merchant(self.merchant.as_deref())
            .currency(self.currency.as_deref())
            .date_range(date_from, date_to)
            .search(self.search.as_deref());
        filter.validate()?;

        let sort = Sort {
            field: match non_blank(self.sort_by.as_deref()) {
                Some(s) => s.parse()?,
                None => SortField::default(),
            },
            order: match non_blank(self.sort_order.as_deref()) {
                Some(s) => s.parse()?,
                None => SortOrder::default(),
            },
        };

        let page = Page::new(
            parse_int("offset", self.offset.as_deref())?,
            parse_int("limit", self.limit.as_deref())?,
            max_page_size,
        )?;

        Ok((filter, sort, page))
    }
}

/// Parse an optional `type` filter
pub fn parse_type(value: Option<&str>) -> Result<Option<TransactionType>> {
    non_blank(value)
        .map(|s| s.parse::<TransactionType>().map_err(Error::InvalidFilter))
        .transpose()
}

/// Parse an optional `YYYY-MM-DD` parameter
pub fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    non_blank(value)
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
                Error::InvalidFilter(format!("{} '{}' is not a YYYY-MM-DD date", name, s))
            })
        })
        .transpose()
}

/// Parse an optional integer parameter
pub fn parse_int(name: &str, value: Option<&str>) -> Result<Option<i64>> {
    non_blank(value)
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::InvalidFilter(format!("{} '{}' is not an integer", name, s)))
        })
        .transpose()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `%term%` with LIKE wildcards in the term escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
