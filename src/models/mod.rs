//! Wire types for the catalog and token services, plus the page and
//! aggregation shapes the executor works with.

pub mod catalog;
pub mod sts;

use serde::{Deserialize, Serialize};

/// Page-size ceiling for every list operation
pub const MAX_PAGE_SIZE: i32 = 200;

/// One remote response unit. A present token means another page exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        // An empty token is treated as "no more pages"
        let next_token = next_token.filter(|t| !t.is_empty());
        Self { items, next_token }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Every page of one logical list query, concatenated in arrival order.
/// Carries no continuation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult<T> {
    pub items: Vec<T>,
    #[serde(skip)]
    pub pages: usize,
}

impl<T> AggregatedResult<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for AggregatedResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// AWS JSON timestamps are fractional epoch seconds
pub(crate) mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let seconds =
            value.timestamp() as f64 + f64::from(value.timestamp_subsec_millis()) / 1000.0;
        serializer.serialize_f64(seconds)
    }

    pub(crate) fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
        DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<f64>::deserialize(deserializer)? {
                Some(seconds) => super::from_seconds(seconds).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("timestamp {} out of range", seconds))
                }),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_terminates() {
        let page = Page::new(vec![1, 2], Some(String::new()));
        assert!(page.is_last());
        let page = Page::new(vec![1, 2], Some("t".into()));
        assert!(!page.is_last());
    }

    #[test]
    fn epoch_seconds_keep_millis() {
        let ts = epoch_seconds::from_seconds(1_636_000_000.25).unwrap();
        assert_eq!(ts.timestamp(), 1_636_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }
}
