//! License record data structure.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A newly issued retail-food license fetched from the data portal.
///
/// The portal guarantees no unique identifier, so records are never
/// deduplicated beyond the watermark cutoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseRecord {
    /// Legal business name
    pub name: String,

    /// Street address
    pub address: String,

    /// Postal code
    pub zip_code: String,

    /// License type, e.g. "RETAIL FOOD ESTABLISHMENT"
    pub license_description: String,

    /// Free-form business activity description
    #[serde(default)]
    pub business_activity: Option<String>,

    /// Square footage as published (unit-less, may contain separators)
    #[serde(default)]
    pub square_footage: Option<String>,

    /// City ward identifier
    #[serde(default)]
    pub ward: Option<String>,

    /// Application timestamp in the portal's floating local time
    pub issued_at: NaiveDateTime,
}

impl LicenseRecord {
    /// Business activity, if present and not blank.
    pub fn business_activity(&self) -> Option<&str> {
        non_blank(self.business_activity.as_deref())
    }

    /// Square footage, if present and not blank.
    pub fn square_footage(&self) -> Option<&str> {
        non_blank(self.square_footage.as_deref())
    }

    /// Ward, if present and not blank.
    pub fn ward(&self) -> Option<&str> {
        non_blank(self.ward.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
