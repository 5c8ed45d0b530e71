//! Structured postal addresses and their single-line rendering.
//!
//! Trip endpoints arrive from the fleet API with a structured address, and the
//! reverse geocoder produces the same shape. The core only ever sees the joined
//! line produced here.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A postal address split into the parts the logbook prints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Address {
    pub country: Option<String>,
    pub region: Option<String>,
    pub locality: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub zip: Option<String>,
}

impl Address {
    /// Comma-joined line of the non-empty parts, most general first.
    ///
    /// ```
    /// use zone_logbook::Address;
    ///
    /// let addr = Address {
    ///     country: Some("Romania".into()),
    ///     locality: Some("Cluj-Napoca".into()),
    ///     street: Some("Strada Memorandumului".into()),
    ///     house_number: Some("28".into()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(addr.to_line(), "Romania, Cluj-Napoca, Strada Memorandumului, 28");
    /// ```
    pub fn to_line(&self) -> String {
        [
            &self.country,
            &self.region,
            &self.locality,
            &self.street,
            &self.house_number,
            &self.zip,
        ]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// True when no part carries any text.
    pub fn is_empty(&self) -> bool {
        self.to_line().is_empty()
    }
}

/// Format an optional address, empty string when absent.
pub fn format_address(address: Option<&Address>) -> String {
    address.map(Address::to_line).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_address() {
        let addr = Address {
            country: Some("Hungary".into()),
            region: Some("Pest".into()),
            locality: Some("Budapest".into()),
            street: Some("Andrássy út".into()),
            house_number: Some("22".into()),
            zip: Some("1061".into()),
        };
        assert_eq!(addr.to_line(), "Hungary, Pest, Budapest, Andrássy út, 22, 1061");
    }

    #[test]
    fn test_skips_missing_and_empty_parts() {
        let addr = Address {
            country: Some("Hungary".into()),
            region: Some(String::new()),
            zip: Some("1061".into()),
            ..Default::default()
        };
        assert_eq!(addr.to_line(), "Hungary, 1061");
    }

    #[test]
    fn test_format_absent_address() {
        assert_eq!(format_address(None), "");
        assert!(Address::default().is_empty());
    }
}
