//! List parameters and pagination utilities
//!
//! Parses the JSON:API query string of a request:
//!
//! ```text
//! GET /posts?filter[published]=true&sort=-title&page[number]=2&page[size]=10&fields[posts]=title
//! ```

use crate::core::document::DocumentLinks;
use crate::core::error::ApiError;
use std::collections::{BTreeMap, HashMap};

/// Query parameters of a list-style request
///
/// Unknown parameters are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// `filter[name]=a,b`
    pub filters: BTreeMap<String, Vec<String>>,
    /// `sort=a,-b`, raw keys including the direction prefix
    pub sort: Vec<String>,
    pub page_number: Option<u64>,
    pub page_size: Option<u64>,
    /// `fields[type]=a,b`
    pub fields: HashMap<String, Vec<String>>,
}

fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn encode_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| urlencoding::encode(value))
        .collect::<Vec<_>>()
        .join(",")
}

fn positive(key: &str, value: &str) -> Result<u64, ApiError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError::bad_request(format!(
            "'{}' must be a positive integer, got '{}'",
            key, value
        ))),
    }
}

impl ListParams {
    /// Parse decoded query pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = ListParams::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());

            if key == "sort" {
                params.sort.extend(split_list(value));
            } else if let Some(name) = bracketed(key, "filter") {
                let values = split_list(value);
                if !values.is_empty() {
                    params.filters.insert(name.to_string(), values);
                }
            } else if let Some(kind) = bracketed(key, "fields") {
                params.fields.insert(kind.to_string(), split_list(value));
            } else if key == "page[number]" {
                params.page_number = Some(positive(key, value)?);
            } else if key == "page[size]" {
                params.page_size = Some(positive(key, value)?);
            }
        }

        Ok(params)
    }

    /// Sparse fieldset requested for a resource type
    pub fn fields_for(&self, kind: &str) -> Option<&[String]> {
        self.fields.get(kind).map(Vec::as_slice)
    }

    /// Filter and sort parameters echoed in pagination links
    ///
    /// Names and values are percent-encoded; the `,` separating values is not.
    pub fn link_suffix(&self) -> String {
        let mut suffix = String::new();
        for (name, values) in &self.filters {
            suffix.push_str(&format!(
                "&filter[{}]={}",
                urlencoding::encode(name),
                encode_list(values)
            ));
        }
        if !self.sort.is_empty() {
            suffix.push_str(&format!("&sort={}", encode_list(&self.sort)));
        }
        suffix
    }
}

/// Resolved page of a paginated list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    /// Resolve the effective page
    ///
    /// A positive `limit` forces pagination and caps the page size.
    /// Otherwise pagination is active only when a size is requested.
    pub fn resolve(number: Option<u64>, size: Option<u64>, limit: u64) -> Option<Page> {
        if limit > 0 {
            let size = size.map_or(limit, |s| s.min(limit));
            return Some(Page {
                number: number.unwrap_or(1),
                size,
            });
        }

        size.map(|size| Page {
            number: number.unwrap_or(1),
            size,
        })
    }

    /// Number of documents to skip
    pub fn skip(&self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }

    /// Last page number; at least 1 even for an empty result
    pub fn last(&self, total: u64) -> u64 {
        total.div_ceil(self.size).max(1)
    }

    fn link(base: &str, number: u64, size: u64, suffix: &str) -> String {
        format!(
            "{}?page[number]={}&page[size]={}{}",
            base, number, size, suffix
        )
    }

    /// Pagination links for a collection
    pub fn links(&self, base: &str, total: u64, suffix: &str) -> DocumentLinks {
        let last = self.last(total);
        DocumentLinks {
            self_link: Self::link(base, self.number, self.size, suffix),
            first: Some(Self::link(base, 1, self.size, suffix)),
            last: Some(Self::link(base, last, self.size, suffix)),
            prev: (self.number > 1).then(|| Self::link(base, self.number - 1, self.size, suffix)),
            next: (self.number < last).then(|| Self::link(base, self.number + 1, self.size, suffix)),
        }
    }
}
