//! Predicate compiler: [`FilterCriteria`] into an ordered, AND-combined [`PredicateSet`].
//!
//! The same set feeds both the count and the list query, so two requests with the same
//! effective criteria compile to identical sets and the two numbers always describe the same
//! logical query.

use std::fmt;

use serde::Serialize;

use super::criteria::{FilterCriteria, Selection, StatusFilter};
use crate::listing::{Listing, Vocabulary};

/// Column a predicate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Status,
    Make,
    Model,
    FuelType,
    BodyType,
    Transmission,
    Price,
    Year,
    Mileage,
    /// Virtual column: any of [`Field::columns`] for free-text search.
    Keywords,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Status => "status",
            Field::Make => "make",
            Field::Model => "model",
            Field::FuelType => "fuelType",
            Field::BodyType => "bodyType",
            Field::Transmission => "transmission",
            Field::Price => "price",
            Field::Year => "year",
            Field::Mileage => "mileage",
            Field::Keywords => "keywords",
        }
    }

    /// Physical columns behind this field. Only `Keywords` spans more than one.
    pub fn columns(self) -> &'static [Field] {
        match self {
            Field::Keywords => &[Field::Make, Field::Model],
            Field::Status => &[Field::Status],
            Field::Make => &[Field::Make],
            Field::Model => &[Field::Model],
            Field::FuelType => &[Field::FuelType],
            Field::BodyType => &[Field::BodyType],
            Field::Transmission => &[Field::Transmission],
            Field::Price => &[Field::Price],
            Field::Year => &[Field::Year],
            Field::Mileage => &[Field::Mileage],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Gte,
    Lte,
    /// Case-insensitive substring match.
    Contains,
    In,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::In => "in",
        }
    }
}

/// Comparison operand. Text is already case-folded or canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(u64),
    Text(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Atomic, side-effect free filter condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Predicate {
    pub field: Field,
    #[serde(rename = "op")]
    pub operator: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(field: Field, operator: Operator, value: Value) -> Self {
        Self { field, operator, value }
    }

    /// Evaluate against a single record.
    pub fn matches(&self, listing: &Listing) -> bool {
        self.field.columns().iter().any(|&column| {
            let actual = column_value(listing, column);
            match (&self.operator, &self.value) {
                (Operator::Eq, expected) => values_equal(&actual, expected),
                (Operator::In, Value::List(options)) => {
                    options.iter().any(|expected| values_equal(&actual, expected))
                }
                (Operator::Gte, Value::Number(bound)) => {
                    matches!(actual, Value::Number(n) if n >= *bound)
                }
                (Operator::Lte, Value::Number(bound)) => {
                    matches!(actual, Value::Number(n) if n <= *bound)
                }
                (Operator::Contains, Value::Text(needle)) => match &actual {
                    Value::Text(haystack) => haystack.to_lowercase().contains(needle.as_str()),
                    _ => false,
                },
                _ => false,
            }
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field.as_str(), self.operator.as_str(), self.value)
    }
}

fn column_value(listing: &Listing, column: Field) -> Value {
    match column {
        Field::Status => Value::Text(listing.status.as_str().to_string()),
        Field::Make => Value::Text(listing.make.clone()),
        Field::Model => Value::Text(listing.model.clone()),
        Field::FuelType => Value::Text(listing.fuel_type.as_str().to_string()),
        Field::BodyType => Value::Text(listing.body_type.as_str().to_string()),
        Field::Transmission => Value::Text(listing.transmission.as_str().to_string()),
        Field::Price => Value::Number(listing.price),
        Field::Year => Value::Number(listing.year),
        Field::Mileage => Value::Number(listing.mileage),
        Field::Keywords => Value::Text(format!("{} {}", listing.make, listing.model)),
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Text(a), Value::Text(b)) => a.to_lowercase() == b.to_lowercase(),
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => false,
    }
}

/// Ordered, implicitly AND-combined list of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PredicateSet(Vec<Predicate>);

impl PredicateSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Predicate] {
        &self.0
    }

    /// True when every predicate holds for `listing`.
    pub fn matches(&self, listing: &Listing) -> bool {
        self.0.iter().all(|p| p.matches(listing))
    }

    /// Canonical text form, suitable as a cache key.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PredicateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" & ")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PredicateSet {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compile criteria into predicates, emitted in fixed field order.
pub fn compile(criteria: &FilterCriteria) -> PredicateSet {
    let mut out = Vec::new();

    if let Some(StatusFilter::Only(status)) = criteria.status() {
        out.push(Predicate::new(Field::Status, Operator::Eq, text(status.as_str())));
    }
    if let Some(make) = criteria.make() {
        out.push(Predicate::new(Field::Make, Operator::Eq, text(make.folded())));
    }
    if let Some(model) = criteria.model() {
        out.push(Predicate::new(Field::Model, Operator::Eq, text(model.folded())));
    }
    push_selection(&mut out, Field::FuelType, criteria.fuel_types());
    push_selection(&mut out, Field::BodyType, criteria.body_types());
    push_selection(&mut out, Field::Transmission, criteria.transmissions());

    if let Some(price) = criteria.price() {
        push_bounds(&mut out, Field::Price, price.min(), price.max());
    }
    if let Some(year) = criteria.year() {
        push_bounds(&mut out, Field::Year, year.min(), year.max());
    }
    if let Some(max) = criteria.mileage_max() {
        out.push(Predicate::new(Field::Mileage, Operator::Lte, Value::Number(max)));
    }
    if let Some(q) = criteria.search_text() {
        out.push(Predicate::new(Field::Keywords, Operator::Contains, text(q.folded())));
    }

    PredicateSet(out)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn push_selection<T>(out: &mut Vec<Predicate>, field: Field, selection: Option<&Selection<T>>)
where
    T: Vocabulary + Ord,
{
    let Some(selection) = selection else { return };
    match selection.single() {
        Some(only) => out.push(Predicate::new(field, Operator::Eq, text(only.as_str()))),
        None => {
            let options = selection.iter().map(|v| text(v.as_str())).collect();
            out.push(Predicate::new(field, Operator::In, Value::List(options)));
        }
    }
}

fn push_bounds(out: &mut Vec<Predicate>, field: Field, min: Option<u64>, max: Option<u64>) {
    if let Some(min) = min {
        out.push(Predicate::new(field, Operator::Gte, Value::Number(min)));
    }
    if let Some(max) = max {
        out.push(Predicate::new(field, Operator::Lte, Value::Number(max)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{normalize, NormalizerConfig, RawParams};
    use crate::listing::{BodyType, FuelType, Status, Transmission};

    fn compile_pairs(pairs: &[(&str, &str)], cfg: NormalizerConfig) -> PredicateSet {
        let raw: RawParams = pairs.iter().copied().collect();
        compile(&normalize(&raw, &cfg))
    }

    fn golf() -> Listing {
        Listing {
            id: 1,
            make: "Volkswagen".into(),
            model: "Golf GTI".into(),
            status: Status::Live,
            price: 14_000,
            year: 2017,
            mileage: 48_000,
            fuel_type: FuelType::Petrol,
            body_type: BodyType::Hatchback,
            transmission: Transmission::Manual,
            listed_at: 0,
        }
    }

    #[test]
    fn emission_order_is_fixed() {
        let set = compile_pairs(
            &[
                ("q", "gti"),
                ("mileageMax", "60000"),
                ("priceMax", "15000"),
                ("fuelType", "petrol"),
                ("make", "VOLKSWAGEN"),
            ],
            NormalizerConfig::public(),
        );
        let fields: Vec<_> = set.iter().map(|p| (p.field, p.operator)).collect();
        assert_eq!(
            fields,
            vec![
                (Field::Status, Operator::Eq),
                (Field::Make, Operator::Eq),
                (Field::FuelType, Operator::Eq),
                (Field::Price, Operator::Lte),
                (Field::Mileage, Operator::Lte),
                (Field::Keywords, Operator::Contains),
            ]
        );
    }

    #[test]
    fn parameter_order_does_not_change_compiled_form() {
        let a = compile_pairs(
            &[("make", "Ford"), ("fuelType", "diesel,petrol"), ("yearMin", "2015")],
            NormalizerConfig::public(),
        );
        let b = compile_pairs(
            &[("yearMin", "2015"), ("fuelType", "petrol"), ("fuelType", "diesel"), ("make", "ford")],
            NormalizerConfig::public(),
        );
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn multi_select_compiles_to_in() {
        let set = compile_pairs(&[("bodyType", "suv,estate")], NormalizerConfig::administrator());
        assert_eq!(set.len(), 1);
        let p = &set.as_slice()[0];
        assert_eq!(p.operator, Operator::In);
        assert_eq!(
            p.value,
            Value::List(vec![Value::Text("estate".into()), Value::Text("suv".into())])
        );
    }

    #[test]
    fn admin_without_status_emits_nothing() {
        assert!(compile_pairs(&[("status", "ALL")], NormalizerConfig::administrator()).is_empty());
    }

    #[test]
    fn single_bound_ranges_emit_one_predicate() {
        let set = compile_pairs(&[("yearMin", "2010")], NormalizerConfig::administrator());
        assert_eq!(set.as_slice(), &[Predicate::new(Field::Year, Operator::Gte, Value::Number(2010))]);
    }

    #[test]
    fn keywords_match_make_or_model_case_insensitively() {
        let car = golf();
        for q in ["volks", "GTI", "golf"] {
            let set = compile_pairs(&[("q", q)], NormalizerConfig::public());
            assert!(set.matches(&car), "{q}");
        }
        let set = compile_pairs(&[("q", "polo")], NormalizerConfig::public());
        assert!(!set.matches(&car));
    }

    #[test]
    fn predicates_evaluate_against_listing() {
        let car = golf();
        let hit = compile_pairs(
            &[
                ("make", "volkswagen"),
                ("priceMin", "14000"),
                ("priceMax", "14000"),
                ("fuelType", "petrol,diesel"),
                ("transmission", "manual"),
                ("mileageMax", "48000"),
            ],
            NormalizerConfig::public(),
        );
        assert!(hit.matches(&car));

        let miss = compile_pairs(&[("yearMin", "2018")], NormalizerConfig::public());
        assert!(!miss.matches(&car));

        let draft = Listing { status: Status::Draft, ..golf() };
        assert!(!compile_pairs(&[], NormalizerConfig::public()).matches(&draft));
    }

    #[test]
    fn display_is_canonical() {
        let set = compile_pairs(&[("priceMin", "100"), ("make", "Ford")], NormalizerConfig::public());
        assert_eq!(set.cache_key(), r#"status eq "LIVE" & make eq "ford" & price gte 100"#);
    }
}
