//! Listing record and the closed vocabularies used to describe it.

use serde::{Deserialize, Serialize};

/// A closed set of named variants with a canonical wire spelling.
///
/// Parsing is case-insensitive and ignores `_`, `-` and spaces, so `Plug-in Hybrid`,
/// `plugin_hybrid` and `PLUGINHYBRID` all name the same variant. Anything else is rejected.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Every variant, in canonical order.
    const ALL: &'static [Self];

    /// Canonical wire spelling.
    fn as_str(self) -> &'static str;

    fn parse_loose(input: &str) -> Option<Self> {
        let wanted = fold(input);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL.iter().copied().find(|v| fold(v.as_str()) == wanted)
    }
}

fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Publication state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Live,
    Sold,
    Draft,
}

impl Vocabulary for Status {
    const ALL: &'static [Self] = &[Status::Live, Status::Sold, Status::Draft];

    fn as_str(self) -> &'static str {
        match self {
            Status::Live => "LIVE",
            Status::Sold => "SOLD",
            Status::Draft => "DRAFT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Petrol,
    Diesel,
    Hybrid,
    PluginHybrid,
    Electric,
    Lpg,
}

impl Vocabulary for FuelType {
    const ALL: &'static [Self] = &[
        FuelType::Petrol,
        FuelType::Diesel,
        FuelType::Hybrid,
        FuelType::PluginHybrid,
        FuelType::Electric,
        FuelType::Lpg,
    ];

    fn as_str(self) -> &'static str {
        match self {
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Hybrid => "hybrid",
            FuelType::PluginHybrid => "plugin_hybrid",
            FuelType::Electric => "electric",
            FuelType::Lpg => "lpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    Hatchback,
    Saloon,
    Estate,
    Suv,
    Coupe,
    Convertible,
    Mpv,
    Pickup,
    Van,
}

impl Vocabulary for BodyType {
    const ALL: &'static [Self] = &[
        BodyType::Hatchback,
        BodyType::Saloon,
        BodyType::Estate,
        BodyType::Suv,
        BodyType::Coupe,
        BodyType::Convertible,
        BodyType::Mpv,
        BodyType::Pickup,
        BodyType::Van,
    ];

    fn as_str(self) -> &'static str {
        match self {
            BodyType::Hatchback => "hatchback",
            BodyType::Saloon => "saloon",
            BodyType::Estate => "estate",
            BodyType::Suv => "suv",
            BodyType::Coupe => "coupe",
            BodyType::Convertible => "convertible",
            BodyType::Mpv => "mpv",
            BodyType::Pickup => "pickup",
            BodyType::Van => "van",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Manual,
    Automatic,
    SemiAutomatic,
}

impl Vocabulary for Transmission {
    const ALL: &'static [Self] =
        &[Transmission::Manual, Transmission::Automatic, Transmission::SemiAutomatic];

    fn as_str(self) -> &'static str {
        match self {
            Transmission::Manual => "manual",
            Transmission::Automatic => "automatic",
            Transmission::SemiAutomatic => "semi_automatic",
        }
    }
}

/// A vehicle listing as returned by the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique identifier; also the pagination tie-break key.
    pub id: u64,
    pub make: String,
    pub model: String,
    pub status: Status,
    /// Asking price in whole currency units.
    pub price: u64,
    pub year: u64,
    pub mileage: u64,
    pub fuel_type: FuelType,
    pub body_type: BodyType,
    pub transmission: Transmission,
    /// Unix millis when the listing went up.
    pub listed_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_loose_ignores_case_and_separators() {
        assert_eq!(FuelType::parse_loose("Plug-in Hybrid"), Some(FuelType::PluginHybrid));
        assert_eq!(FuelType::parse_loose("PLUGINHYBRID"), Some(FuelType::PluginHybrid));
        assert_eq!(FuelType::parse_loose(" - "), None);
        assert_eq!(FuelType::parse_loose("Plugin-Hybrid"), Some(FuelType::PluginHybrid));
        assert_eq!(FuelType::parse_loose(" DIESEL "), Some(FuelType::Diesel));
        assert_eq!(Transmission::parse_loose("semi automatic"), Some(Transmission::SemiAutomatic));
        assert_eq!(Status::parse_loose("live"), Some(Status::Live));
        assert_eq!(BodyType::parse_loose("spaceship"), None);
    }

    #[test]
    fn listing_serializes_camel_case() {
        let listing = Listing {
            id: 7,
            make: "Skoda".into(),
            model: "Octavia".into(),
            status: Status::Live,
            price: 9_500,
            year: 2018,
            mileage: 61_000,
            fuel_type: FuelType::Diesel,
            body_type: BodyType::Estate,
            transmission: Transmission::Manual,
            listed_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["fuelType"], "diesel");
        assert_eq!(json["bodyType"], "estate");
        assert_eq!(json["status"], "LIVE");
        assert_eq!(json["listedAt"], 1_700_000_000_000u64);
    }
}
