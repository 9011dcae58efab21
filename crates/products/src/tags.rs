//! Product tags: independent boolean flags overlaid on the lifecycle state.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use roastah_core::DomainError;

/// Name of one of the five product flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductTag {
    #[serde(rename = "isUnlisted")]
    Unlisted,
    #[serde(rename = "isPrivate")]
    Private,
    #[serde(rename = "isPreorder")]
    Preorder,
    #[serde(rename = "isOutOfStock")]
    OutOfStock,
    #[serde(rename = "isScheduled")]
    Scheduled,
}

impl ProductTag {
    pub const ALL: [ProductTag; 5] = [
        ProductTag::Unlisted,
        ProductTag::Private,
        ProductTag::Preorder,
        ProductTag::OutOfStock,
        ProductTag::Scheduled,
    ];

    /// Field name on the product record (`isPreorder`, ...).
    pub fn field_name(self) -> &'static str {
        match self {
            ProductTag::Unlisted => "isUnlisted",
            ProductTag::Private => "isPrivate",
            ProductTag::Preorder => "isPreorder",
            ProductTag::OutOfStock => "isOutOfStock",
            ProductTag::Scheduled => "isScheduled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProductTag::Unlisted => "Unlisted",
            ProductTag::Private => "Private",
            ProductTag::Preorder => "Pre-order",
            ProductTag::OutOfStock => "Out of Stock",
            ProductTag::Scheduled => "Scheduled",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ProductTag::Unlisted => "slate",
            ProductTag::Private => "purple",
            ProductTag::Preorder => "blue",
            ProductTag::OutOfStock => "red",
            ProductTag::Scheduled => "indigo",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            ProductTag::Unlisted => "unlisted",
            ProductTag::Private => "private",
            ProductTag::Preorder => "preorder",
            ProductTag::OutOfStock => "out_of_stock",
            ProductTag::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for ProductTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for ProductTag {
    type Err = DomainError;

    /// Accepts the record field name (`isOutOfStock`) or the short name
    /// (`out-of-stock`, `out_of_stock`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let short = trimmed.to_ascii_lowercase().replace('-', "_");
        ProductTag::ALL
            .into_iter()
            .find(|tag| tag.field_name() == trimmed || tag.short_name() == short)
            .ok_or_else(|| DomainError::validation(format!("unknown product tag '{s}'")))
    }
}

/// The five tag booleans as they appear on a product record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTags {
    #[serde(default)]
    pub is_unlisted: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_preorder: bool,
    #[serde(default)]
    pub is_out_of_stock: bool,
    #[serde(default)]
    pub is_scheduled: bool,
}

impl ProductTags {
    pub fn get(&self, tag: ProductTag) -> bool {
        match tag {
            ProductTag::Unlisted => self.is_unlisted,
            ProductTag::Private => self.is_private,
            ProductTag::Preorder => self.is_preorder,
            ProductTag::OutOfStock => self.is_out_of_stock,
            ProductTag::Scheduled => self.is_scheduled,
        }
    }

    pub fn set(&mut self, tag: ProductTag, value: bool) {
        let slot = match tag {
            ProductTag::Unlisted => &mut self.is_unlisted,
            ProductTag::Private => &mut self.is_private,
            ProductTag::Preorder => &mut self.is_preorder,
            ProductTag::OutOfStock => &mut self.is_out_of_stock,
            ProductTag::Scheduled => &mut self.is_scheduled,
        };
        *slot = value;
    }

    /// Builder-style `set`.
    pub fn with(mut self, tag: ProductTag, value: bool) -> Self {
        self.set(tag, value);
        self
    }

    /// Tags currently `true`, in declaration order (badge order).
    pub fn active(&self) -> Vec<ProductTag> {
        ProductTag::ALL
            .into_iter()
            .filter(|tag| self.get(*tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_reports_exactly_the_true_flags() {
        let tags = ProductTags {
            is_preorder: true,
            is_out_of_stock: false,
            ..ProductTags::default()
        };
        let active = tags.active();
        assert!(active.contains(&ProductTag::Preorder));
        assert!(!active.contains(&ProductTag::OutOfStock));
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn set_touches_only_one_flag() {
        let mut tags = ProductTags::default();
        tags.set(ProductTag::Scheduled, true);
        assert_eq!(tags.active(), vec![ProductTag::Scheduled]);
        tags.set(ProductTag::Scheduled, false);
        assert!(tags.active().is_empty());
    }

    #[test]
    fn parses_field_and_short_names() {
        assert_eq!("isOutOfStock".parse::<ProductTag>().unwrap(), ProductTag::OutOfStock);
        assert_eq!("out-of-stock".parse::<ProductTag>().unwrap(), ProductTag::OutOfStock);
        assert_eq!("Preorder".parse::<ProductTag>().unwrap(), ProductTag::Preorder);
        assert!("featured".parse::<ProductTag>().is_err());
    }

    #[test]
    fn record_fields_are_camel_case() {
        let tags = ProductTags::default().with(ProductTag::OutOfStock, true);
        let json = serde_json::to_value(tags).unwrap();
        assert_eq!(json["isOutOfStock"], true);
        assert_eq!(json["isPreorder"], false);
        for tag in ProductTag::ALL {
            assert!(json.get(tag.field_name()).is_some(), "missing {tag}");
        }
    }

    #[test]
    fn missing_fields_default_to_false() {
        let tags: ProductTags = serde_json::from_str(r#"{"isPrivate": true}"#).unwrap();
        assert_eq!(tags.active(), vec![ProductTag::Private]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: `active` is exactly the set of flags that `get` reports true.
            #[test]
            fn active_matches_get(bits in proptest::array::uniform5(any::<bool>())) {
                let mut tags = ProductTags::default();
                for (tag, on) in ProductTag::ALL.into_iter().zip(bits) {
                    tags.set(tag, on);
                }
                let active = tags.active();
                for (tag, on) in ProductTag::ALL.into_iter().zip(bits) {
                    prop_assert_eq!(active.contains(&tag), on);
                }
            }

            /// Property: labels and colours are non-empty and deterministic.
            #[test]
            fn tag_labels_are_stable(idx in 0usize..5) {
                let tag = ProductTag::ALL[idx];
                prop_assert!(!tag.label().is_empty());
                prop_assert_eq!(tag.color(), tag.color());
                prop_assert_eq!(tag.to_string().parse::<ProductTag>().unwrap(), tag);
            }
        }
    }
}
