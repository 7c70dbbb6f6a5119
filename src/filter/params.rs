//! Untyped request parameters as received from the transport.

/// Names of the query parameters the inventory endpoints understand.
pub mod keys {
    pub const MAKE: &str = "make";
    pub const MODEL: &str = "model";
    pub const STATUS: &str = "status";
    pub const PRICE_MIN: &str = "priceMin";
    pub const PRICE_MAX: &str = "priceMax";
    pub const YEAR_MIN: &str = "yearMin";
    pub const YEAR_MAX: &str = "yearMax";
    pub const MILEAGE_MAX: &str = "mileageMax";
    pub const FUEL_TYPE: &str = "fuelType";
    pub const BODY_TYPE: &str = "bodyType";
    pub const TRANSMISSION: &str = "transmission";
    pub const SEARCH_TEXT: &str = "q";
    pub const PAGE: &str = "page";
    pub const PAGE_SIZE: &str = "pageSize";
    pub const SORT: &str = "sort";
}

/// Ordered multimap of parameter name to values.
///
/// Repeated keys accumulate in arrival order; nothing is validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    entries: Vec<(String, String)>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `key=value` occurrence.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Every value supplied for `key`, in arrival order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// First value supplied for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for RawParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RawParams::new();
        params.extend(iter);
        params
    }
}

impl<K, V> Extend<(K, V)> for RawParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl From<Vec<(String, String)>> for RawParams {
    fn from(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_accumulate_in_order() {
        let params: RawParams =
            [("fuelType", "diesel"), ("make", "Ford"), ("fuelType", "petrol")].into_iter().collect();
        assert_eq!(params.get_all("fuelType").collect::<Vec<_>>(), vec!["diesel", "petrol"]);
        assert_eq!(params.first("make"), Some("Ford"));
        assert_eq!(params.first("model"), None);
        assert!(params.contains_key("make"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn first_outlives_a_temporary_key() {
        let params = RawParams::new().with("sort", "-price").with("sort", "year");
        let value = {
            let key = String::from("sort");
            params.first(&key)
        };
        assert_eq!(value, Some("-price"));
    }
}
