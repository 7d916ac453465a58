//! # Sale Repository
//!
//! Sale records are written by [`TabRepository::finalize`] and never edited;
//! they only leave the store through a purge.
//!
//! [`TabRepository::finalize`]: crate::repository::TabRepository::finalize

use chrono::NaiveDate;
use tracing::info;

use comanda_core::{daily_totals, DailyTotal, SaleRecord};

use crate::error::DbResult;
use crate::store::{Command, Query};
use crate::Store;

/// Repository for sale history.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    store: Store,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(store: Store) -> Self {
        SaleRepository { store }
    }

    /// Records of one day, in the order they were written.
    pub async fn list_for_day(&self, day: NaiveDate) -> DbResult<Vec<SaleRecord>> {
        self.store.fetch_all(&Query::SalesForDay { day }).await
    }

    /// Every record, oldest day first.
    pub async fn list_all(&self) -> DbResult<Vec<SaleRecord>> {
        self.store.fetch_all(&Query::AllSales).await
    }

    /// Deletes the records of one day. Returns how many were deleted.
    pub async fn purge_day(&self, day: NaiveDate) -> DbResult<u64> {
        let outcome = self.store.run(&Command::DeleteSalesForDay { day }).await?;
        info!(day = %day, deleted = outcome.affected_rows, "Sales purged for day");
        Ok(outcome.affected_rows)
    }

    /// Deletes every record. Returns how many were deleted.
    pub async fn purge_all(&self) -> DbResult<u64> {
        let outcome = self.store.run(&Command::DeleteAllSales).await?;
        info!(deleted = outcome.affected_rows, "All sales purged");
        Ok(outcome.affected_rows)
    }

    /// Quantity and value sold per day, oldest first.
    pub async fn daily_totals(&self) -> DbResult<Vec<DailyTotal>> {
        Ok(daily_totals(&self.list_all().await?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::both_backends;
    use comanda_core::{NewLineItem, ProductInput};

    async fn sell(store: &Store, tab_name: &str, quantity: i64, day: &str) {
        let tab = store.tabs().create(tab_name).await.unwrap();
        store
            .line_items()
            .add(NewLineItem::new(tab, "Coxinha", quantity))
            .await
            .unwrap();
        store.tabs().finalize(tab, day.parse().unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_and_purges() {
        for store in both_backends().await {
            store
                .products()
                .upsert(ProductInput::new("Coxinha", 350))
                .await
                .unwrap();
            sell(&store, "Mesa 1", 2, "2026-10-19").await;
            sell(&store, "Mesa 2", 1, "2026-10-18").await;
            sell(&store, "Mesa 3", 3, "2026-10-19").await;

            let sales = store.sales();
            let all = sales.list_all().await.unwrap();
            assert_eq!(all.len(), 3);
            assert_eq!(all[0].tab_name, "Mesa 2");

            let totals = sales.daily_totals().await.unwrap();
            assert_eq!(totals.len(), 2);
            assert_eq!(totals[1].quantity, 5);
            assert_eq!(totals[1].total.cents(), 1750);

            let day = "2026-10-19".parse().unwrap();
            assert_eq!(sales.list_for_day(day).await.unwrap().len(), 2);
            assert_eq!(sales.purge_day(day).await.unwrap(), 2);
            assert!(sales.list_for_day(day).await.unwrap().is_empty());

            assert_eq!(sales.purge_all().await.unwrap(), 1);
            assert!(sales.list_all().await.unwrap().is_empty());
        }
    }
}
