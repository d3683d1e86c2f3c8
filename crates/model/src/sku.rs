use serde::{Deserialize, Serialize};

use vendstock_core::{MachineId, SkuId, SlotId, StockError, StockResult, TrayId};

/// A sellable packaged product. Quantity lives in slot inventory rows,
/// never on the product itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuProduct {
    id: SkuId,
    product_id: String,
    name: String,
    /// Price in smallest currency unit (e.g., cents).
    price: u64,
}

impl SkuProduct {
    pub fn new(
        id: SkuId,
        product_id: impl Into<String>,
        name: impl Into<String>,
        price: u64,
    ) -> StockResult<Self> {
        let product_id = product_id.into();
        let name = name.into();
        if product_id.trim().is_empty() {
            return Err(StockError::invalid_input("product id cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(StockError::invalid_input("product name cannot be empty"));
        }
        Ok(Self {
            id,
            product_id,
            name,
            price,
        })
    }

    pub fn id(&self) -> SkuId {
        self.id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }
}

/// Composite key for one physical slot+SKU pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub machine_id: MachineId,
    pub tray_id: TrayId,
    pub slot_id: SlotId,
    pub sku_id: SkuId,
}

/// Quantity on hand for one slot+SKU pairing. One row per [`SlotKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInventory {
    key: SlotKey,
    quantity_on_hand: u32,
}

impl SlotInventory {
    pub fn new(key: SlotKey, quantity_on_hand: u32) -> Self {
        Self {
            key,
            quantity_on_hand,
        }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn quantity_on_hand(&self) -> u32 {
        self.quantity_on_hand
    }

    /// Draw `quantity` units, failing when the slot is short.
    pub fn consume(&mut self, quantity: u32) -> StockResult<()> {
        match self.quantity_on_hand.checked_sub(quantity) {
            Some(remaining) => {
                self.quantity_on_hand = remaining;
                Ok(())
            }
            None => Err(StockError::insufficient(quantity, self.quantity_on_hand)),
        }
    }

    /// Put `quantity` units back (refund restoration).
    pub fn restock(&mut self, quantity: u32) {
        self.quantity_on_hand = self.quantity_on_hand.saturating_add(quantity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SlotKey {
        SlotKey {
            machine_id: MachineId::new(),
            tray_id: TrayId::new(),
            slot_id: SlotId::new(),
            sku_id: SkuId::new(),
        }
    }

    #[test]
    fn sku_product_rejects_blank_product_id() {
        let err = SkuProduct::new(SkuId::new(), "  ", "Chips", 150).unwrap_err();
        match err {
            StockError::InvalidInput(_) => {}
            _ => panic!("Expected InvalidInput for blank product id"),
        }
    }

    #[test]
    fn consume_decrements_quantity() {
        let mut row = SlotInventory::new(test_key(), 10);
        row.consume(3).unwrap();
        assert_eq!(row.quantity_on_hand(), 7);
    }

    #[test]
    fn consume_rejects_short_quantity() {
        let mut row = SlotInventory::new(test_key(), 2);
        let err = row.consume(3).unwrap_err();
        match err {
            StockError::InsufficientStock {
                requested: 3,
                available: 2,
            } => {}
            _ => panic!("Expected InsufficientStock with requested/available"),
        }
        assert_eq!(row.quantity_on_hand(), 2);
    }

    #[test]
    fn restock_adds_quantity() {
        let mut row = SlotInventory::new(test_key(), 1);
        row.restock(4);
        assert_eq!(row.quantity_on_hand(), 5);
    }
}
