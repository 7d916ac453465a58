//! # Totals & Summaries
//!
//! Everything here is recomputed from line items or sale records on demand;
//! nothing is cached in the store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::resolve::fold_name;
use crate::types::{LineItem, SaleRecord};
use crate::TOP_PRODUCTS_LIMIT;

/// Sum of `quantity × unit_price` over a tab's items.
///
/// ## Example
/// ```rust,ignore
/// // (2 × 3.50) + (1 × 5.00)
/// assert_eq!(tab_total(&items)?.cents(), 1200);
/// ```
pub fn tab_total(items: &[LineItem]) -> CoreResult<Money> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        add_amount(acc, item.line_total()?, "tab total")
    })
}

fn add_amount(acc: Money, amount: Money, context: &str) -> CoreResult<Money> {
    acc.checked_add(amount).ok_or_else(|| overflow(context))
}

fn overflow(context: &str) -> CoreError {
    CoreError::AmountOverflow {
        context: context.to_string(),
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Quantity and value sold for one product name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductTally {
    pub product_name: String,
    pub quantity: i64,
    pub total: Money,
}

/// Figures shown on the dashboard screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    pub open_tabs: usize,
    pub closed_tabs: usize,
    pub open_total: Money,
    pub closed_total: Money,
    pub grand_total: Money,
    /// Best sellers by value across open and closed tabs.
    pub top_products: Vec<ProductTally>,
}

impl DashboardSummary {
    /// Builds the summary from the items of open and closed tabs.
    pub fn compute(
        open_tabs: usize,
        open_items: &[LineItem],
        closed_tabs: usize,
        closed_items: &[LineItem],
    ) -> CoreResult<Self> {
        let open_total = tab_total(open_items)?;
        let closed_total = tab_total(closed_items)?;

        // Items of the same product typed with different casing count together.
        let mut tallies: HashMap<String, ProductTally> = HashMap::new();
        for item in open_items.iter().chain(closed_items) {
            let tally = tallies
                .entry(fold_name(&item.product_name))
                .or_insert_with(|| ProductTally {
                    product_name: item.product_name.clone(),
                    quantity: 0,
                    total: Money::zero(),
                });
            tally.quantity = tally
                .quantity
                .checked_add(item.quantity)
                .ok_or_else(|| overflow("product quantity"))?;
            tally.total = add_amount(tally.total, item.line_total()?, "product total")?;
        }

        let mut top_products: Vec<ProductTally> = tallies.into_values().collect();
        top_products.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| b.quantity.cmp(&a.quantity))
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        top_products.truncate(TOP_PRODUCTS_LIMIT);

        Ok(DashboardSummary {
            open_tabs,
            closed_tabs,
            open_total,
            closed_total,
            grand_total: add_amount(open_total, closed_total, "grand total")?,
            top_products,
        })
    }
}

// =============================================================================
// Daily Sales
// =============================================================================

/// Sales of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyTotal {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub quantity: i64,
    pub total: Money,
}

/// Groups sale records by day, oldest first.
pub fn daily_totals(sales: &[SaleRecord]) -> CoreResult<Vec<DailyTotal>> {
    let mut days: BTreeMap<NaiveDate, (i64, Money)> = BTreeMap::new();
    for sale in sales {
        let (quantity, total) = days.entry(sale.day).or_insert((0, Money::zero()));
        *quantity = quantity
            .checked_add(sale.quantity)
            .ok_or_else(|| overflow("daily quantity"))?;
        *total = add_amount(*total, sale.line_total()?, "daily total")?;
    }

    Ok(days
        .into_iter()
        .map(|(day, (quantity, total))| DailyTotal { day, quantity, total })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineItemId, SaleRecordId, TabId};
    use chrono::Utc;

    fn item(name: &str, quantity: i64, unit_price_cents: i64) -> LineItem {
        LineItem {
            id: LineItemId::from_raw(1),
            tab_id: TabId::from_raw(1),
            product_id: None,
            product_name: name.to_string(),
            quantity,
            unit_price_cents,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn sale(day: &str, quantity: i64, unit_price_cents: i64) -> SaleRecord {
        SaleRecord {
            id: SaleRecordId::from_raw(1),
            day: day.parse().unwrap(),
            tab_name: "Mesa 1".to_string(),
            product_name: "Coxinha".to_string(),
            quantity,
            unit_price_cents,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_tab_total_is_exact() {
        let items = vec![item("Coxinha", 2, 350), item("Pastel", 1, 500)];
        assert_eq!(tab_total(&items).unwrap(), Money::from_cents(1200));
        assert_eq!(tab_total(&items).unwrap().to_string(), "12.00");
        assert_eq!(tab_total(&[]).unwrap(), Money::zero());
    }

    #[test]
    fn test_overflowing_totals_are_errors() {
        let huge = i64::MAX / 2;

        let items = vec![item("Caro", 3, huge)];
        assert!(matches!(tab_total(&items), Err(CoreError::AmountOverflow { .. })));

        // Each line fits, the sum does not.
        let items = vec![item("Caro", 1, huge), item("Caro", 1, huge), item("Caro", 1, huge)];
        assert!(tab_total(&items).is_err());
        assert!(DashboardSummary::compute(1, &items, 0, &[]).is_err());

        let open = vec![item("Caro", 1, huge)];
        let closed = vec![item("Caro", 2, huge)];
        assert!(DashboardSummary::compute(1, &open, 1, &closed).is_err());

        let sales = vec![sale("2026-10-19", 2, huge), sale("2026-10-19", 2, huge)];
        assert!(matches!(
            daily_totals(&sales),
            Err(CoreError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_dashboard_totals_and_ranking() {
        let open = vec![item("Coxinha", 2, 350), item("Refri", 1, 600)];
        let closed = vec![item("coxinha", 4, 350), item("Pastel", 1, 800)];

        let summary = DashboardSummary::compute(2, &open, 1, &closed).unwrap();

        assert_eq!(summary.open_tabs, 2);
        assert_eq!(summary.closed_tabs, 1);
        assert_eq!(summary.open_total.cents(), 1300);
        assert_eq!(summary.closed_total.cents(), 2200);
        assert_eq!(summary.grand_total.cents(), 3500);

        let first = &summary.top_products[0];
        assert_eq!(first.product_name, "Coxinha");
        assert_eq!(first.quantity, 6);
        assert_eq!(first.total.cents(), 2100);
        assert_eq!(summary.top_products[1].product_name, "Pastel");
        assert_eq!(summary.top_products.len(), 3);
    }

    #[test]
    fn test_dashboard_keeps_top_five() {
        let items: Vec<LineItem> = (1..=8).map(|i| item(&format!("P{i}"), 1, i * 100)).collect();
        let summary = DashboardSummary::compute(1, &items, 0, &[]).unwrap();
        assert_eq!(summary.top_products.len(), TOP_PRODUCTS_LIMIT);
        assert_eq!(summary.top_products[0].product_name, "P8");
    }

    #[test]
    fn test_daily_totals_grouped_by_day() {
        let sales = vec![
            sale("2026-10-19", 2, 350),
            sale("2026-10-18", 1, 500),
            sale("2026-10-19", 1, 500),
        ];
        let days = daily_totals(&sales).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day.to_string(), "2026-10-18");
        assert_eq!(days[0].total.cents(), 500);
        assert_eq!(days[1].quantity, 3);
        assert_eq!(days[1].total.cents(), 1200);
    }
}
