//! Editable product fields and their validation rules.
//!
//! Validation runs on the client before any request is sent and again inside
//! the aggregate, so malformed input never reaches the catalog.

use serde::{Deserialize, Deserializer, Serialize};

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_ORIGIN_LEN: usize = 80;
pub const MAX_PRICE_CENTS: u64 = 10_000_000;
pub const MAX_WEIGHT_GRAMS: u32 = 50_000;

/// Roast profile of a coffee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoastLevel {
    Light,
    Medium,
    MediumDark,
    Dark,
}

impl RoastLevel {
    pub fn label(self) -> &'static str {
        match self {
            RoastLevel::Light => "Light",
            RoastLevel::Medium => "Medium",
            RoastLevel::MediumDark => "Medium-Dark",
            RoastLevel::Dark => "Dark",
        }
    }
}

/// Field-level validation failure, surfaced inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for FieldError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Editable fields of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in cents.
    pub price_cents: u64,
    pub weight_grams: u32,
    pub roast_level: RoastLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ProductDetails {
    /// Trim surrounding whitespace from `name` and `origin`, as validated.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.origin = self.origin.map(|origin| origin.trim().to_string());
        self
    }

    /// Check every field, collecting all failures.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        } else if name.chars().count() > MAX_NAME_LEN {
            errors.push(FieldError::new(
                "name",
                format!("name must be at most {MAX_NAME_LEN} characters"),
            ));
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(FieldError::new(
                "description",
                format!("description must be at most {MAX_DESCRIPTION_LEN} characters"),
            ));
        }

        if self.price_cents == 0 {
            errors.push(FieldError::new("priceCents", "price must be greater than zero"));
        } else if self.price_cents > MAX_PRICE_CENTS {
            errors.push(FieldError::new("priceCents", "price is unrealistically high"));
        }

        if self.weight_grams == 0 || self.weight_grams > MAX_WEIGHT_GRAMS {
            errors.push(FieldError::new(
                "weightGrams",
                format!("weight must be between 1 and {MAX_WEIGHT_GRAMS} grams"),
            ));
        }

        if let Some(origin) = &self.origin {
            let origin = origin.trim();
            if origin.is_empty() {
                errors.push(FieldError::new("origin", "origin cannot be blank"));
            } else if origin.chars().count() > MAX_ORIGIN_LEN {
                errors.push(FieldError::new(
                    "origin",
                    format!("origin must be at most {MAX_ORIGIN_LEN} characters"),
                ));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Partial update of [`ProductDetails`]; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roast_level: Option<RoastLevel>,
    /// `Some(None)` clears the origin; on the wire that is an explicit `null`.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<Option<String>>,
}

/// Keeps `"field": null` apart from an absent field.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge onto `current`. The result is normalized but not validated.
    pub fn apply_to(&self, current: &ProductDetails) -> ProductDetails {
        let origin = match &self.origin {
            Some(origin) => origin.clone(),
            None => current.origin.clone(),
        };
        ProductDetails {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            price_cents: self.price_cents.unwrap_or(current.price_cents),
            weight_grams: self.weight_grams.unwrap_or(current.weight_grams),
            roast_level: self.roast_level.unwrap_or(current.roast_level),
            origin,
        }
        .normalized()
    }
}

#[cfg(test)]
pub(crate) fn sample_details() -> ProductDetails {
    ProductDetails {
        name: "Ethiopia Guji".to_string(),
        description: "Stone fruit, jasmine".to_string(),
        price_cents: 1_899,
        weight_grams: 340,
        roast_level: RoastLevel::Light,
        origin: Some("Guji, Ethiopia".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_details_pass() {
        assert!(sample_details().validate().is_ok());
    }

    #[test]
    fn collects_every_field_error() {
        let details = ProductDetails {
            name: "   ".to_string(),
            description: String::new(),
            price_cents: 0,
            weight_grams: 0,
            roast_level: RoastLevel::Dark,
            origin: Some(" ".to_string()),
        };
        let errors = details.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "priceCents", "weightGrams", "origin"]);
    }

    #[test]
    fn rejects_overlong_name() {
        let details = ProductDetails {
            name: "x".repeat(MAX_NAME_LEN + 1),
            ..sample_details()
        };
        let errors = details.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn patch_overrides_only_present_fields() {
        let patch = ProductDetailsPatch {
            price_cents: Some(2_100),
            roast_level: Some(RoastLevel::Medium),
            ..ProductDetailsPatch::default()
        };
        let updated = patch.apply_to(&sample_details());
        assert_eq!(updated.price_cents, 2_100);
        assert_eq!(updated.roast_level, RoastLevel::Medium);
        assert_eq!(updated.name, "Ethiopia Guji");
        assert!(!patch.is_empty());
        assert!(ProductDetailsPatch::default().is_empty());
    }

    #[test]
    fn patch_can_clear_origin() {
        let clear = ProductDetailsPatch {
            origin: Some(None),
            ..ProductDetailsPatch::default()
        };
        assert!(!clear.is_empty());
        assert_eq!(clear.apply_to(&sample_details()).origin, None);
        assert_eq!(
            serde_json::to_value(&clear).unwrap(),
            serde_json::json!({ "origin": null })
        );

        let absent: ProductDetailsPatch = serde_json::from_str(r#"{"name":"Kenya AA"}"#).unwrap();
        assert_eq!(absent.origin, None);
        let null: ProductDetailsPatch = serde_json::from_str(r#"{"origin":null}"#).unwrap();
        assert_eq!(null, clear);
        let set: ProductDetailsPatch = serde_json::from_str(r#"{"origin":"Nyeri"}"#).unwrap();
        assert_eq!(set.origin, Some(Some("Nyeri".to_string())));
    }

    #[test]
    fn applied_patch_stores_trimmed_values() {
        let patch = ProductDetailsPatch {
            name: Some("  Kenya AA ".to_string()),
            origin: Some(Some(" Nyeri ".to_string())),
            ..ProductDetailsPatch::default()
        };
        let updated = patch.apply_to(&sample_details());
        assert!(updated.validate().is_ok());
        assert_eq!(updated.name, "Kenya AA");
        assert_eq!(updated.origin.as_deref(), Some("Nyeri"));
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = ProductDetailsPatch {
            name: Some("Kenya AA".to_string()),
            ..ProductDetailsPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Kenya AA" }));
    }
}
