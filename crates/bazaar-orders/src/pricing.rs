//! # Price List
//!
//! Line items carry the unit price the client saw at checkout. When a price
//! list is configured, every submitted item is checked against it and a
//! product missing from the list, or a price that differs, is rejected. With
//! no list configured the submitted price is taken as given, which is only
//! appropriate when the caller (the storefront) is trusted to quote prices.

use std::collections::BTreeMap;

use bazaar_core::{Money, ProductId, ValidationError};
use bazaar_state::LineItem;

use crate::config::ConfigError;

/// Authoritative unit prices keyed by product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceList {
    prices: BTreeMap<ProductId, Money>,
}

impl PriceList {
    pub fn new(prices: impl IntoIterator<Item = (ProductId, Money)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
        }
    }

    /// Parse a YAML map of product id to unit price in minor units.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, i64> =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::PriceList(e.to_string()))?;
        let mut prices = BTreeMap::new();
        for (product, minor) in raw {
            let price = Money::from_minor(minor)
                .map_err(|e| ConfigError::PriceList(format!("{product}: {e}")))?;
            let product =
                ProductId::new(&product).map_err(|e| ConfigError::PriceList(e.to_string()))?;
            if prices.insert(product.clone(), price).is_some() {
                return Err(ConfigError::PriceList(format!("{product} listed twice")));
            }
        }
        Ok(Self { prices })
    }

    pub fn price(&self, product: &ProductId) -> Option<Money> {
        self.prices.get(product).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Reject any item whose product is unlisted or whose price differs.
    pub fn check(&self, items: &[LineItem]) -> Result<(), ValidationError> {
        for item in items {
            match self.price(&item.product_id) {
                None => {
                    return Err(ValidationError::Field(format!(
                        "product {} is not for sale",
                        item.product_id
                    )))
                }
                Some(listed) if listed != item.unit_price => {
                    return Err(ValidationError::Field(format!(
                        "unitPrice for {} is {}, expected {}",
                        item.product_id,
                        item.unit_price.minor_units(),
                        listed.minor_units()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: &str, unit: i64) -> LineItem {
        LineItem {
            product_id: ProductId::new(product).unwrap(),
            quantity: 1,
            unit_price: Money::from_minor(unit).unwrap(),
        }
    }

    fn list() -> PriceList {
        PriceList::from_yaml("sku-1: 999\nsku-2: 500\n").unwrap()
    }

    #[test]
    fn listed_prices_pass() {
        assert_eq!(list().len(), 2);
        assert!(list().check(&[item("sku-1", 999), item("sku-2", 500)]).is_ok());
    }

    #[test]
    fn underquoted_price_rejected() {
        let err = list().check(&[item("sku-1", 999), item("sku-2", 1)]).unwrap_err();
        assert_eq!(err.to_string(), "unitPrice for sku-2 is 1, expected 500");
    }

    #[test]
    fn unlisted_product_rejected() {
        let err = list().check(&[item("sku-9", 100)]).unwrap_err();
        assert!(err.to_string().contains("sku-9"));
    }

    #[test]
    fn negative_or_blank_entries_rejected() {
        assert!(matches!(
            PriceList::from_yaml("sku-1: -5\n"),
            Err(ConfigError::PriceList(_))
        ));
        assert!(matches!(
            PriceList::from_yaml("\" \": 5\n"),
            Err(ConfigError::PriceList(_))
        ));
        assert!(matches!(
            PriceList::from_yaml("- sku-1\n"),
            Err(ConfigError::PriceList(_))
        ));
    }
}
