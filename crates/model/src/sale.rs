use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use vendstock_core::{MachineId, RecipeId, SkuId, SlotId, StockError, StockResult, TrayId};

/// Sale transaction identifier: `TXN-<millis>-<6 uppercase alphanumerics>`.
///
/// Generated exactly once per sale attempt; the receipt and the persisted
/// record must carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

const TXN_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TXN_SUFFIX_LEN: usize = 6;

impl TransactionId {
    pub fn generate() -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..TXN_SUFFIX_LEN)
            .map(|_| TXN_SUFFIX_CHARSET[rng.gen_range(0..TXN_SUFFIX_CHARSET.len())] as char)
            .collect();
        Self(format!("TXN-{timestamp}-{suffix}"))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What kind of stock a sale drew from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleType {
    Sku,
    Coffee,
}

/// How a sale was paid. Recorded as data; no processing happens here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Digital,
}

/// Sale record lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Completed,
    Failed,
    Refunded,
}

/// One SKU drawn from a slot. Retains the originating tray and slot so a
/// refund can restore stock to the exact position it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuLine {
    pub sku_id: SkuId,
    pub tray_id: TrayId,
    pub slot_id: SlotId,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub total_price: u64,
}

/// One brewed recipe serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeLine {
    pub recipe_id: RecipeId,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub total_price: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleLine {
    Sku(SkuLine),
    Coffee(CoffeeLine),
}

impl SaleLine {
    pub fn total_price(&self) -> u64 {
        match self {
            SaleLine::Sku(line) => line.total_price,
            SaleLine::Coffee(line) => line.total_price,
        }
    }

    fn matches_type(&self, sale_type: SaleType) -> bool {
        matches!(
            (self, sale_type),
            (SaleLine::Sku(_), SaleType::Sku) | (SaleLine::Coffee(_), SaleType::Coffee)
        )
    }
}

/// A completed (or refunded) sale. Immutable once written except for the
/// `Completed` to `Refunded` status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    transaction_id: TransactionId,
    machine_id: MachineId,
    sale_type: SaleType,
    lines: Vec<SaleLine>,
    /// Sum of line totals, in smallest currency unit.
    total_amount: u64,
    payment_method: PaymentMethod,
    customer_id: Option<String>,
    status: SaleStatus,
    timestamp: DateTime<Utc>,
}

impl SaleRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: TransactionId,
        machine_id: MachineId,
        sale_type: SaleType,
        lines: Vec<SaleLine>,
        total_amount: u64,
        payment_method: PaymentMethod,
        customer_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> StockResult<Self> {
        if lines.is_empty() {
            return Err(StockError::invalid_input("sale needs at least one line"));
        }
        if lines.iter().any(|line| !line.matches_type(sale_type)) {
            return Err(StockError::invalid_input(
                "sale line kind does not match sale type",
            ));
        }
        let line_sum = lines
            .iter()
            .try_fold(0u64, |sum, line| sum.checked_add(line.total_price()))
            .ok_or_else(|| StockError::invariant("sale total overflow"))?;
        if line_sum != total_amount {
            return Err(StockError::invariant(
                "total amount does not equal the sum of line totals",
            ));
        }
        Ok(Self {
            transaction_id,
            machine_id,
            sale_type,
            lines,
            total_amount,
            payment_method,
            customer_id,
            status: SaleStatus::Completed,
            timestamp,
        })
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn machine_id(&self) -> MachineId {
        self.machine_id
    }

    pub fn sale_type(&self) -> SaleType {
        self.sale_type
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Transition to `Refunded`. Refunding twice is rejected.
    pub fn mark_refunded(&mut self) -> StockResult<()> {
        if self.status == SaleStatus::Refunded {
            return Err(StockError::already_refunded(self.transaction_id.as_str()));
        }
        self.status = SaleStatus::Refunded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sku_line(quantity: u32, unit_price: u64) -> SaleLine {
        SaleLine::Sku(SkuLine {
            sku_id: SkuId::new(),
            tray_id: TrayId::new(),
            slot_id: SlotId::new(),
            quantity,
            unit_price,
            total_price: unit_price * u64::from(quantity),
        })
    }

    fn test_sale(lines: Vec<SaleLine>, total: u64) -> StockResult<SaleRecord> {
        SaleRecord::new(
            TransactionId::generate(),
            MachineId::new(),
            SaleType::Sku,
            lines,
            total,
            PaymentMethod::Cash,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn transaction_id_has_expected_shape() {
        let id = TransactionId::generate();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn sale_record_rejects_total_mismatch() {
        let err = test_sale(vec![test_sku_line(2, 150)], 999).unwrap_err();
        match err {
            StockError::InvariantViolation(msg) if msg.contains("total amount") => {}
            _ => panic!("Expected InvariantViolation for total mismatch"),
        }
    }

    #[test]
    fn sale_record_rejects_overflowing_line_sum() {
        // Wrapping would make these lines sum to 0 and match the total.
        let lines = vec![test_sku_line(1, u64::MAX), test_sku_line(1, 1)];
        let err = test_sale(lines, 0).unwrap_err();
        match err {
            StockError::InvariantViolation(msg) if msg.contains("overflow") => {}
            _ => panic!("Expected InvariantViolation for line sum overflow"),
        }
    }

    #[test]
    fn sale_record_rejects_empty_lines() {
        let err = test_sale(vec![], 0).unwrap_err();
        match err {
            StockError::InvalidInput(_) => {}
            _ => panic!("Expected InvalidInput for empty lines"),
        }
    }

    #[test]
    fn sale_record_rejects_line_type_mismatch() {
        let coffee_line = SaleLine::Coffee(CoffeeLine {
            recipe_id: RecipeId::new(),
            quantity: 1,
            unit_price: 250,
            total_price: 250,
        });
        let err = test_sale(vec![coffee_line], 250).unwrap_err();
        match err {
            StockError::InvalidInput(msg) if msg.contains("sale type") => {}
            _ => panic!("Expected InvalidInput for line kind mismatch"),
        }
    }

    #[test]
    fn refund_transitions_once() {
        let mut sale = test_sale(vec![test_sku_line(2, 150)], 300).unwrap();
        assert_eq!(sale.status(), SaleStatus::Completed);

        sale.mark_refunded().unwrap();
        assert_eq!(sale.status(), SaleStatus::Refunded);

        let err = sale.mark_refunded().unwrap_err();
        match err {
            StockError::AlreadyRefunded(_) => {}
            _ => panic!("Expected AlreadyRefunded on second refund"),
        }
    }

    #[test]
    fn sale_type_serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&SaleType::Coffee).unwrap(),
            "\"COFFEE\""
        );
        assert_eq!(
            serde_json::to_string(&SaleStatus::Refunded).unwrap(),
            "\"REFUNDED\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Digital).unwrap(),
            "\"DIGITAL\""
        );
    }
}
