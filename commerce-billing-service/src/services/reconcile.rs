//! Line-item reconciliation for document updates.
//!
//! The stored item list of a purchase, sale or quotation is diffed against the
//! submitted list by `itemId`. Each submitted line is classified as added,
//! updated or unchanged, and every stored line missing from the submission is
//! removed. Callers turn the classification into item-table writes and
//! inventory notifications.

use crate::dtos::items::{PurchaseItemRequest, SaleItemRequest};
use crate::models::{PurchaseItem, QuotationItem, SaleItem};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::{BTreeMap, BTreeSet};

/// The fields whose change makes a line count as updated.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFingerprint<'a> {
    pub item_id: i64,
    pub item_name: &'a str,
    pub unit_name: &'a str,
    pub units: Decimal,
    pub price_per_unit: Decimal,
    pub total_after_tax: Decimal,
    pub tax: Decimal,
}

pub trait ReconcilableItem {
    fn fingerprint(&self) -> ItemFingerprint<'_>;

    fn item_id(&self) -> i64 {
        self.fingerprint().item_id
    }
}

#[derive(Debug, Clone)]
pub struct ItemUpdate<O, N> {
    pub old: O,
    pub new: N,
}

/// Result of diffing stored lines `O` against submitted lines `N`.
/// Every list is in ascending `itemId` order.
#[derive(Debug, Clone)]
pub struct ItemChanges<O, N> {
    pub added: Vec<N>,
    pub updated: Vec<ItemUpdate<O, N>>,
    pub removed: Vec<O>,
    pub unchanged: usize,
}

impl<O, N> Default for ItemChanges<O, N> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            unchanged: 0,
        }
    }
}

impl<O, N> ItemChanges<O, N> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Whether the inventory needs an update (as opposed to record) call.
    pub fn has_updates_or_removals(&self) -> bool {
        !self.updated.is_empty() || !self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("duplicate itemId {0} in items")]
    DuplicateItem(i64),
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        AppError::Unprocessable(anyhow::Error::new(err))
    }
}

/// Reject a submission that lists the same `itemId` twice.
pub fn ensure_unique_item_ids<N: ReconcilableItem>(items: &[N]) -> Result<(), ReconcileError> {
    let mut seen = BTreeSet::new();
    for item in items {
        let item_id = item.item_id();
        if !seen.insert(item_id) {
            return Err(ReconcileError::DuplicateItem(item_id));
        }
    }
    Ok(())
}

/// Classify submitted lines against stored ones.
///
/// Submitted lines must already be rounded to the document's precision so
/// that an untouched line compares equal to its stored form.
pub fn reconcile<O, N>(old: Vec<O>, new: Vec<N>) -> Result<ItemChanges<O, N>, ReconcileError>
where
    O: ReconcilableItem,
    N: ReconcilableItem,
{
    ensure_unique_item_ids(&new)?;
    let submitted: BTreeMap<i64, N> = new.into_iter().map(|item| (item.item_id(), item)).collect();

    let mut stored: BTreeMap<i64, O> = old.into_iter().map(|item| (item.item_id(), item)).collect();
    let mut changes = ItemChanges::default();

    for (item_id, new_item) in submitted {
        match stored.remove(&item_id) {
            None => changes.added.push(new_item),
            Some(old_item) if old_item.fingerprint() != new_item.fingerprint() => {
                changes.updated.push(ItemUpdate {
                    old: old_item,
                    new: new_item,
                });
            }
            Some(_) => changes.unchanged += 1,
        }
    }

    changes.removed = stored.into_values().collect();
    Ok(changes)
}

impl ReconcilableItem for PurchaseItem {
    fn fingerprint(&self) -> ItemFingerprint<'_> {
        ItemFingerprint {
            item_id: self.item_id,
            item_name: &self.item_name,
            unit_name: &self.unit_name,
            units: self.units_purchased,
            price_per_unit: self.price_per_unit,
            total_after_tax: self.total_after_tax,
            tax: self.tax,
        }
    }
}

impl ReconcilableItem for SaleItem {
    fn fingerprint(&self) -> ItemFingerprint<'_> {
        ItemFingerprint {
            item_id: self.item_id,
            item_name: &self.item_name,
            unit_name: &self.unit_name,
            units: self.units_sold,
            price_per_unit: self.price_per_unit,
            total_after_tax: self.total_after_tax,
            tax: self.tax,
        }
    }
}

impl ReconcilableItem for QuotationItem {
    fn fingerprint(&self) -> ItemFingerprint<'_> {
        ItemFingerprint {
            item_id: self.item_id,
            item_name: &self.item_name,
            unit_name: &self.unit_name,
            units: self.units_sold,
            price_per_unit: self.price_per_unit,
            total_after_tax: self.total_after_tax,
            tax: self.tax,
        }
    }
}

impl ReconcilableItem for PurchaseItemRequest {
    fn fingerprint(&self) -> ItemFingerprint<'_> {
        ItemFingerprint {
            item_id: self.item_id,
            item_name: &self.item_name,
            unit_name: &self.unit_name,
            units: self.units_purchased,
            price_per_unit: self.price_per_unit,
            total_after_tax: self.total_after_tax,
            tax: self.tax,
        }
    }
}

impl ReconcilableItem for SaleItemRequest {
    fn fingerprint(&self) -> ItemFingerprint<'_> {
        ItemFingerprint {
            item_id: self.item_id,
            item_name: &self.item_name,
            unit_name: &self.unit_name,
            units: self.units_sold,
            price_per_unit: self.price_per_unit,
            total_after_tax: self.total_after_tax,
            tax: self.tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn stored(item_id: i64, units: &str, price: &str) -> PurchaseItem {
        let now = Utc::now();
        PurchaseItem {
            purchase_id: 1,
            item_id,
            item_name: format!("item-{}", item_id),
            company_id: 1,
            unit_id: 1,
            unit_name: "pcs".to_string(),
            units_purchased: dec(units),
            price_per_unit: dec(price),
            subtotal: dec(units) * dec(price),
            tax: dec("0.00"),
            tax_percent: dec("0"),
            total_after_tax: round(dec(units) * dec(price)),
            created_at: now,
            updated_at: now,
        }
    }

    fn round(value: Decimal) -> Decimal {
        crate::utils::round_to(value, 2)
    }

    fn submitted(item_id: i64, units: &str, price: &str) -> PurchaseItemRequest {
        PurchaseItemRequest {
            item_id,
            item_name: format!("item-{}", item_id),
            unit_id: 1,
            unit_name: "pcs".to_string(),
            units_purchased: dec(units),
            price_per_unit: dec(price),
            subtotal: dec(units) * dec(price),
            tax: Decimal::ZERO,
            tax_percent: Decimal::ZERO,
            total_after_tax: dec(units) * dec(price),
        }
        .rounded(2)
    }

    #[test]
    fn test_classifies_added_updated_removed() {
        let old = vec![stored(1, "2", "10"), stored(2, "1", "5"), stored(3, "4", "1")];
        let new = vec![submitted(4, "1", "1"), submitted(2, "3", "5"), submitted(1, "2", "10")];

        let changes = reconcile(old, new).unwrap();

        assert_eq!(changes.added.iter().map(|i| i.item_id).collect::<Vec<_>>(), vec![4]);
        assert_eq!(changes.updated.len(), 1);
        assert_eq!(changes.updated[0].old.item_id, 2);
        assert_eq!(changes.updated[0].old.units_purchased, dec("1"));
        assert_eq!(changes.updated[0].new.units_purchased, dec("3"));
        assert_eq!(changes.removed.iter().map(|i| i.item_id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(changes.unchanged, 1);
        assert!(changes.has_updates_or_removals());
    }

    #[test]
    fn test_resubmitted_line_is_unchanged_after_rounding() {
        // Stored at 2dp; the client sends more precision that rounds to the same value.
        let old = vec![stored(1, "3", "3.333")];
        let mut line = submitted(1, "3", "3.333");
        line.total_after_tax = dec("9.9990001");
        let changes = reconcile(old, vec![line.rounded(2)]).unwrap();

        assert!(changes.is_empty());
        assert_eq!(changes.unchanged, 1);
    }

    #[test]
    fn test_scale_differences_are_not_changes() {
        let old = vec![stored(5, "1.0", "2.50")];
        let new = vec![submitted(5, "1", "2.5")];
        assert!(reconcile(old, new).unwrap().is_empty());
    }

    #[test]
    fn test_name_change_counts_as_update() {
        let old = vec![stored(1, "1", "1")];
        let mut line = submitted(1, "1", "1");
        line.item_name = "renamed".to_string();
        let changes = reconcile(old, vec![line]).unwrap();
        assert_eq!(changes.updated.len(), 1);
    }

    #[test]
    fn test_tax_percent_alone_is_not_compared() {
        let old = vec![stored(1, "1", "1")];
        let mut line = submitted(1, "1", "1");
        line.tax_percent = dec("18");
        assert!(reconcile(old, vec![line]).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_submitted_item_is_rejected() {
        let new = vec![submitted(7, "1", "1"), submitted(7, "2", "1")];
        let err = reconcile(Vec::<PurchaseItem>::new(), new).unwrap_err();
        assert_eq!(err, ReconcileError::DuplicateItem(7));
    }

    #[test]
    fn test_unique_item_ids_accepted() {
        let items = vec![submitted(1, "1", "1"), submitted(2, "1", "1")];
        assert!(ensure_unique_item_ids(&items).is_ok());

        let dup = vec![submitted(3, "1", "1"), submitted(4, "1", "1"), submitted(3, "5", "1")];
        assert_eq!(
            ensure_unique_item_ids(&dup).unwrap_err(),
            ReconcileError::DuplicateItem(3)
        );
    }

    #[test]
    fn test_empty_submission_removes_everything_in_order() {
        let old = vec![stored(9, "1", "1"), stored(2, "1", "1"), stored(5, "1", "1")];
        let changes = reconcile(old, Vec::<PurchaseItemRequest>::new()).unwrap();
        assert_eq!(
            changes.removed.iter().map(|i| i.item_id).collect::<Vec<_>>(),
            vec![2, 5, 9]
        );
        assert!(changes.added.is_empty());
    }

    #[test]
    fn test_added_lines_come_out_ascending() {
        let new = vec![submitted(30, "1", "1"), submitted(10, "1", "1"), submitted(20, "1", "1")];
        let changes = reconcile(Vec::<PurchaseItem>::new(), new).unwrap();
        assert_eq!(
            changes.added.iter().map(|i| i.item_id).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        assert!(!changes.has_updates_or_removals());
    }
}
