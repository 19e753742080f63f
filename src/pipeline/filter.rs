//! Filter engine.
//!
//! Three independent rules, AND-combined, evaluated in order:
//! 1. license type must not be in `excluded_license_types`
//! 2. ward must be in `included_wards`
//! 3. postal code must be in `included_zip_codes`
//!
//! An empty list imposes no constraint. A record missing the field an
//! allowlist checks never matches that allowlist.

use std::fmt;

use crate::models::{FilterConfig, LicenseRecord};

/// Why a record was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ExcludedLicenseType,
    WardNotIncluded,
    ZipCodeNotIncluded,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::ExcludedLicenseType => "license type is excluded",
            Rejection::WardNotIncluded => "ward is not included",
            Rejection::ZipCodeNotIncluded => "zip code is not included",
        };
        f.write_str(reason)
    }
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == value)
}

/// Evaluate the rules, reporting the first one that rejects.
pub fn check(record: &LicenseRecord, filters: &FilterConfig) -> Result<(), Rejection> {
    if !filters.excluded_license_types.is_empty()
        && contains(&filters.excluded_license_types, &record.license_description)
    {
        return Err(Rejection::ExcludedLicenseType);
    }

    if !filters.included_wards.is_empty()
        && !record
            .ward()
            .is_some_and(|ward| contains(&filters.included_wards, ward))
    {
        return Err(Rejection::WardNotIncluded);
    }

    if !filters.included_zip_codes.is_empty()
        && !contains(&filters.included_zip_codes, record.zip_code.trim())
    {
        return Err(Rejection::ZipCodeNotIncluded);
    }

    Ok(())
}

/// Whether a record passes every configured rule.
pub fn passes(record: &LicenseRecord, filters: &FilterConfig) -> bool {
    check(record, filters).is_ok()
}
