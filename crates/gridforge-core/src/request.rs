//! Grid request normalization.
//!
//! The grid protocol arrives as flat query pairs with bracketed keys
//! (`order[0][column]`, `columns[2][search][value]`, ...). This module
//! parses them into an immutable [`GridRequest`], validating pagination
//! numbers and resolving sort indexes against the table config's dense
//! column list. Pure transformation; protocol quirks the client is known
//! for (negative `start`) are tolerated, genuinely malformed input is a
//! `BadRequest`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::TableConfig;
use crate::error::{GridError, GridResult};

static ORDER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^order\[(\d+)\]\[(column|dir)\]$").expect("valid regex"));
static COLUMN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^columns\[(\d+)\]\[(name|searchable)\]$").expect("valid regex"));
static COLUMN_SEARCH_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^columns\[(\d+)\]\[search\]\[value\]$").expect("valid regex"));

/// Sort direction of one directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// SQL keyword for this direction
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One client sort directive, referencing a column by request index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDirective {
    pub column_index: usize,
    pub direction: SortDirection,
}

/// Requested page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLength {
    Limited(u64),
    /// The `-1` sentinel: return all matching rows, no pagination cap
    All,
}

impl PageLength {
    /// Row cap, `None` for the "all" sentinel
    pub fn limit(self) -> Option<u64> {
        match self {
            Self::Limited(n) => Some(n),
            Self::All => None,
        }
    }
}

/// A normalized grid request, parsed once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    /// Opaque echo token
    pub draw: u64,
    /// Row offset
    pub start: u64,
    pub length: PageLength,
    /// Global search term; absent and empty are the same thing
    pub search: String,
    /// Sort directives in client order; the first is the primary key
    pub order: Vec<SortDirective>,
    /// `(column index, term)` per-column search entries, only for columns
    /// the request marks searchable with a non-empty value
    pub column_search: Vec<(usize, String)>,
}

impl GridRequest {
    /// Parse raw query pairs against a table config.
    pub fn from_params(params: &[(String, String)], config: &TableConfig) -> GridResult<Self> {
        let mut draw = None;
        let mut start = None;
        let mut length = None;
        let mut search = String::new();
        let mut order_parts: BTreeMap<usize, (Option<&str>, Option<&str>)> = BTreeMap::new();
        let mut column_searchable: BTreeMap<usize, bool> = BTreeMap::new();
        let mut column_terms: BTreeMap<usize, &str> = BTreeMap::new();

        for (key, value) in params {
            match key.as_str() {
                "draw" => draw = Some(value.as_str()),
                "start" => start = Some(value.as_str()),
                "length" => length = Some(value.as_str()),
                "search[value]" => search = value.clone(),
                other => {
                    if let Some(caps) = ORDER_KEY.captures(other) {
                        let index = parse_key_index(&caps[1])?;
                        let entry = order_parts.entry(index).or_default();
                        match &caps[2] {
                            "column" => entry.0 = Some(value.as_str()),
                            _ => entry.1 = Some(value.as_str()),
                        }
                    } else if let Some(caps) = COLUMN_KEY.captures(other) {
                        if &caps[2] == "searchable" {
                            let index = parse_key_index(&caps[1])?;
                            column_searchable.insert(index, matches!(value.as_str(), "true" | "1"));
                        }
                        // columns[i][name] is display metadata; filter columns
                        // resolve through the registry, never the raw name.
                    } else if let Some(caps) = COLUMN_SEARCH_KEY.captures(other) {
                        let index = parse_key_index(&caps[1])?;
                        column_terms.insert(index, value.as_str());
                    }
                }
            }
        }

        let draw = parse_required_u64("draw", draw)?;
        let start = parse_start(start)?;
        let length = parse_length(length)?;
        let order = parse_order(order_parts, config)?;

        let mut column_search = Vec::new();
        for (index, term) in column_terms {
            if term.is_empty() || !column_searchable.get(&index).copied().unwrap_or(false) {
                continue;
            }
            if config.column(index).is_none() {
                return Err(GridError::BadRequest(format!(
                    "search column index {} does not exist",
                    index
                )));
            }
            column_search.push((index, term.to_string()));
        }

        Ok(Self {
            draw,
            start,
            length,
            search,
            order,
            column_search,
        })
    }
}

fn parse_key_index(raw: &str) -> GridResult<usize> {
    raw.parse::<usize>()
        .map_err(|_| GridError::BadRequest(format!("parameter index '{}' is not numeric", raw)))
}

fn parse_required_u64(name: &str, value: Option<&str>) -> GridResult<u64> {
    let raw = value
        .ok_or_else(|| GridError::BadRequest(format!("missing required parameter '{}'", name)))?;
    raw.parse::<u64>()
        .map_err(|_| GridError::BadRequest(format!("parameter '{}' must be numeric", name)))
}

fn parse_start(value: Option<&str>) -> GridResult<u64> {
    let raw = value
        .ok_or_else(|| GridError::BadRequest("missing required parameter 'start'".to_string()))?;
    let start = raw
        .parse::<i64>()
        .map_err(|_| GridError::BadRequest("parameter 'start' must be numeric".to_string()))?;
    // Negative offsets are a known client quirk, clamped rather than rejected
    Ok(start.max(0) as u64)
}

fn parse_length(value: Option<&str>) -> GridResult<PageLength> {
    let raw = value
        .ok_or_else(|| GridError::BadRequest("missing required parameter 'length'".to_string()))?;
    let length = raw
        .parse::<i64>()
        .map_err(|_| GridError::BadRequest("parameter 'length' must be numeric".to_string()))?;
    match length {
        -1 => Ok(PageLength::All),
        n if n > 0 => Ok(PageLength::Limited(n as u64)),
        n => Err(GridError::BadRequest(format!(
            "parameter 'length' must be positive or the -1 sentinel, got {}",
            n
        ))),
    }
}

fn parse_order(
    parts: BTreeMap<usize, (Option<&str>, Option<&str>)>,
    config: &TableConfig,
) -> GridResult<Vec<SortDirective>> {
    let mut order = Vec::with_capacity(parts.len());
    for (position, (column, dir)) in parts {
        let column = column.ok_or_else(|| {
            GridError::BadRequest(format!("order directive {} is missing its column", position))
        })?;
        let dir = dir.ok_or_else(|| {
            GridError::BadRequest(format!(
                "order directive {} is missing its direction",
                position
            ))
        })?;

        let column_index = column.parse::<usize>().map_err(|_| {
            GridError::BadRequest(format!("sort column '{}' is not a column index", column))
        })?;
        if config.column(column_index).is_none() {
            return Err(GridError::BadRequest(format!(
                "sort column index {} does not exist",
                column_index
            )));
        }

        let direction = SortDirection::parse(dir).ok_or_else(|| {
            GridError::BadRequest(format!("sort direction '{}' is not asc or desc", dir))
        })?;

        order.push(SortDirective {
            column_index,
            direction,
        });
    }
    Ok(order)
}

/// Decode a raw query string into ordered key/value pairs.
///
/// Duplicate keys keep their order of appearance; `+` decodes to a space.
pub fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}
