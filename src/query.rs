use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

const ID_SEPARATOR: &str = "--";

/// A geocoding request tagged with the input row it came from.
///
/// Rendered as `"{id}--{address}"` so the row order can be restored after
/// concurrent dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Query {
    pub id: usize,
    pub address: String,
}

impl Query {
    pub fn new(id: usize, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id, ID_SEPARATOR, self.address)
    }
}

impl FromStr for Query {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let (id, address) = value
            .split_once(ID_SEPARATOR)
            .ok_or_else(|| AppError::InvalidQuery(value.to_string()))?;
        let id = id
            .trim()
            .parse::<usize>()
            .map_err(|_| AppError::InvalidQuery(value.to_string()))?;
        Ok(Self::new(id, address))
    }
}

/// Splits an address into ranking tokens.
///
/// The first comma-delimited segment is split into words; later segments
/// are kept whole.
pub fn address_tokens(address: &str) -> Vec<&str> {
    let mut segments = address.split(", ");
    let mut tokens: Vec<&str> = segments
        .next()
        .map(|first| first.split(' ').collect())
        .unwrap_or_default();
    tokens.extend(segments);
    tokens
}

/// Token text mapped to the lowest position it occupies in `tokens`.
#[derive(Debug, Clone)]
pub struct TokenIndex<'a> {
    positions: HashMap<&'a str, usize>,
    len: usize,
}

impl<'a> TokenIndex<'a> {
    pub fn new(tokens: &[&'a str]) -> Self {
        let mut positions = HashMap::with_capacity(tokens.len());
        for (idx, token) in tokens.iter().enumerate() {
            positions.entry(*token).or_insert(idx);
        }
        Self {
            positions,
            len: tokens.len(),
        }
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.positions.get(token).copied()
    }

    /// Rank assigned to names that match no token.
    pub fn not_found(&self) -> usize {
        self.len
    }
}
