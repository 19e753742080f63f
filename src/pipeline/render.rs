//! Announcement renderer.
//!
//! Sections, one per line: header, name, address, then business activity,
//! square footage and ward when enabled and present. Hashtags follow after
//! a blank line. Text is never truncated here.

use crate::models::{LicenseRecord, RenderConfig};

/// Prefix a section with its icon when icons are enabled.
fn section(config: &RenderConfig, prefix: &str, body: &str) -> String {
    if config.use_emojis && !prefix.is_empty() {
        format!("{prefix} {body}")
    } else {
        body.to_string()
    }
}

/// Render a record as announcement text.
pub fn render(record: &LicenseRecord, config: &RenderConfig) -> String {
    let template = &config.template;

    let mut parts = vec![
        template.header.clone(),
        section(config, &template.name_prefix, record.name.trim()),
        section(
            config,
            &template.address_prefix,
            &format!(
                "{}, Chicago IL {}",
                record.address.trim(),
                record.zip_code.trim()
            ),
        ),
    ];

    if config.include_business_activity {
        if let Some(activity) = record.business_activity() {
            parts.push(section(config, &template.activity_prefix, activity));
        }
    }

    if config.include_square_footage {
        if let Some(sqft) = record.square_footage() {
            parts.push(section(
                config,
                &template.square_footage_prefix,
                &format!("{sqft} sq ft"),
            ));
        }
    }

    if config.include_ward {
        if let Some(ward) = record.ward() {
            parts.push(section(
                config,
                &template.ward_prefix,
                &format!("Located in Ward {ward}"),
            ));
        }
    }

    let mut announcement = parts.join("\n");

    if config.add_hashtags && !config.hashtags.is_empty() {
        let tags: Vec<String> = config
            .hashtags
            .iter()
            .map(|tag| format!("#{}", tag.trim_start_matches('#')))
            .collect();
        announcement.push_str("\n\n");
        announcement.push_str(&tags.join(" "));
    }

    announcement
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample_record() -> LicenseRecord {
        LicenseRecord {
            name: "Chicago Deep Dish Paradise".to_string(),
            address: "123 W Madison St".to_string(),
            zip_code: "60601".to_string(),
            license_description: "RETAIL FOOD ESTABLISHMENT".to_string(),
            business_activity: Some("Restaurant with bar and outdoor patio".to_string()),
            square_footage: Some("2,500".to_string()),
            ward: Some("42".to_string()),
            issued_at: NaiveDate::from_ymd_opt(2026, 10, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn config_with_tags(tags: &[&str]) -> RenderConfig {
        RenderConfig {
            hashtags: tags.iter().map(|t| t.to_string()).collect(),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_full_announcement() {
        let text = render(&sample_record(), &config_with_tags(&["ChicagoEats", "NewRestaurant"]));
        let expected = "🆕 New Restaurant Alert!\n\n\
                        🍽️ Chicago Deep Dish Paradise\n\
                        📍 123 W Madison St, Chicago IL 60601\n\
                        🍳 Restaurant with bar and outdoor patio\n\
                        📐 2,500 sq ft\n\
                        📍 Located in Ward 42\n\
                        \n\
                        #ChicagoEats #NewRestaurant";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_missing_activity_is_omitted() {
        let mut record = sample_record();
        record.business_activity = None;
        let text = render(&record, &RenderConfig::default());

        assert!(!text.contains("🍳"));
        assert!(text.contains("📐 2,500 sq ft"));
    }

    #[test]
    fn test_disabled_sections_are_omitted() {
        let mut config = config_with_tags(&["ChicagoEats"]);
        config.include_ward = false;
        config.include_square_footage = false;
        config.add_hashtags = false;
        let text = render(&sample_record(), &config);

        assert!(!text.contains("Ward"));
        assert!(!text.contains("sq ft"));
        assert!(!text.contains('#'));
        assert!(text.ends_with("Restaurant with bar and outdoor patio"));
    }

    #[test]
    fn test_plain_text_without_emojis() {
        let mut config = RenderConfig::default();
        config.use_emojis = false;
        let text = render(&sample_record(), &config);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[2], "Chicago Deep Dish Paradise");
        assert_eq!(lines[3], "123 W Madison St, Chicago IL 60601");
        assert_eq!(lines[6], "Located in Ward 42");
    }

    #[test]
    fn test_empty_hashtag_list_adds_nothing() {
        let text = render(&sample_record(), &config_with_tags(&[]));
        assert!(text.ends_with("Located in Ward 42"));
    }

    #[test]
    fn test_hashtags_are_not_double_prefixed() {
        let text = render(&sample_record(), &config_with_tags(&["#ChicagoEats"]));
        assert!(text.ends_with("\n\n#ChicagoEats"));
    }
}
