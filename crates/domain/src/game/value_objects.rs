//! Value objects for the game domain.

use chrono::{DateTime, Utc};
use common::{Outcome, PlayerId, ValidationFailure};
use serde::{Deserialize, Serialize};

/// Identifies a license plate by issuing country and state/province.
///
/// Both parts are stored trimmed and upper-cased, so `us/ca` and `US/CA`
/// are the same plate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlateKey {
    country: String,
    region: String,
}

impl PlateKey {
    /// Creates a plate key, validating both parts.
    pub fn new(country: impl AsRef<str>, region: impl AsRef<str>) -> Outcome<Self> {
        let country = country.as_ref().trim().to_uppercase();
        let region = region.as_ref().trim().to_uppercase();

        let mut violations = Vec::new();
        if country.is_empty() {
            violations.push(("country", "Country is required"));
        }
        if region.is_empty() {
            violations.push(("region", "State or province is required"));
        }

        match ValidationFailure::from_violations(violations) {
            Some(failure) => Err(failure.into()),
            None => Ok(Self { country, region }),
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl std::fmt::Display for PlateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.country, self.region)
    }
}

/// A plate spotted during a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateSpot {
    pub plate: PlateKey,
    pub spotted_by: PlayerId,
    pub spotted_on: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_key_normalizes_case_and_whitespace() {
        let key = PlateKey::new(" us ", "ca").unwrap();
        assert_eq!(key, PlateKey::new("US", "CA").unwrap());
        assert_eq!(key.to_string(), "US-CA");
    }

    #[test]
    fn plate_key_reports_every_missing_part() {
        let failure = PlateKey::new("", "  ").unwrap_err();
        let validation = failure.as_validation().unwrap();

        assert_eq!(validation.violation_count(), 2);
        assert_eq!(validation.errors_for("country"), ["Country is required"]);
        assert_eq!(
            validation.errors_for("region"),
            ["State or province is required"]
        );
    }
}
