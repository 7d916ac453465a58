//! # Tab Repository
//!
//! Store operations for tabs.
//!
//! ## Tab Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create("Mesa 4") ──► OPEN ──┬── close() ──────► CLOSED (row kept,     │
//! │                        │     │                    shown in history)    │
//! │           add/remove   │     │                                         │
//! │           line items ◄─┘     └── finalize(day) ─► sale records written,│
//! │                                                   tab + items deleted  │
//! │                                                                         │
//! │  delete() at any time ──► tab + items deleted, no sale records         │
//! │                                                                         │
//! │  A closed tab never reopens and never changes.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use comanda_core::validation::validate_tab_name;
use comanda_core::{
    tab_total, CoreError, LineItem, Money, SaleRecord, Tab, TabDetail, TabId, TabStatus,
};

use crate::error::{DbError, DbResult};
use crate::store::{Command, Query};
use crate::Store;

/// Repository for tab operations.
#[derive(Debug, Clone)]
pub struct TabRepository {
    store: Store,
}

impl TabRepository {
    /// Creates a new TabRepository.
    pub fn new(store: Store) -> Self {
        TabRepository { store }
    }

    /// Opens a new tab.
    pub async fn create(&self, name: &str) -> DbResult<TabId> {
        let name = validate_tab_name(name)?;

        let outcome = self
            .store
            .run(&Command::InsertTab {
                name,
                at: Utc::now(),
            })
            .await?;
        let id = TabId::from_raw(outcome.require_inserted_id()?);

        debug!(id = %id, "Tab opened");
        Ok(id)
    }

    /// Gets a tab by its ID.
    pub async fn get(&self, id: TabId) -> DbResult<Option<Tab>> {
        self.store.fetch_optional(&Query::TabById { id }).await
    }

    /// Gets a tab, failing with NotFound if absent.
    pub(crate) async fn require(&self, id: TabId) -> DbResult<Tab> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Tab", id))
    }

    /// Gets a tab that still accepts changes.
    pub(crate) async fn require_open(&self, id: TabId) -> DbResult<Tab> {
        let tab = self.require(id).await?;
        if !tab.is_open() {
            return Err(CoreError::TabNotOpen {
                tab_id: id.to_string(),
            }
            .into());
        }
        Ok(tab)
    }

    /// Open tabs by name.
    pub async fn list_open(&self) -> DbResult<Vec<Tab>> {
        self.store
            .fetch_all(&Query::TabsByStatus {
                status: TabStatus::Open,
            })
            .await
    }

    /// Closed tabs, most recently closed first.
    pub async fn list_closed(&self) -> DbResult<Vec<Tab>> {
        self.store.fetch_all(&Query::TabHistory).await
    }

    /// Every tab, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<Tab>> {
        self.store.fetch_all(&Query::AllTabs).await
    }

    /// Closes a tab, keeping it and its items for the history screen.
    ///
    /// ## Returns
    /// * `Ok(())` - tab is now closed
    /// * `Err(DbError::Core(TabNotOpen))` - already closed
    /// * `Err(DbError::NotFound)` - no such tab
    pub async fn close(&self, id: TabId) -> DbResult<()> {
        self.require_open(id).await?;

        let outcome = self
            .store
            .run(&Command::CloseTab { id, at: Utc::now() })
            .await?;

        // Closed by someone else between the check and the update
        if outcome.affected_rows == 0 {
            return Err(CoreError::TabNotOpen {
                tab_id: id.to_string(),
            }
            .into());
        }

        info!(id = %id, "Tab closed");
        Ok(())
    }

    /// Closes a tab into sale records for `day`, then deletes the tab and
    /// its items.
    ///
    /// All or nothing: either every record is written and the tab is gone,
    /// or nothing changed.
    ///
    /// ## Returns
    /// The sale records written, one per line item, in item order.
    pub async fn finalize(&self, id: TabId, day: NaiveDate) -> DbResult<Vec<SaleRecord>> {
        self.require_open(id).await?;

        let outcome = self
            .store
            .run(&Command::FinalizeTab {
                id,
                day,
                at: Utc::now(),
            })
            .await?;

        // Closed, finalized or deleted between the check and the write
        let Some(written) = outcome.affected_rows.checked_sub(1) else {
            return Err(CoreError::TabNotOpen {
                tab_id: id.to_string(),
            }
            .into());
        };

        let records = match outcome.inserted_id {
            Some(last) if written > 0 => {
                let first = last - (written as i64 - 1);
                let mut records: Vec<SaleRecord> =
                    self.store.fetch_all(&Query::SalesForDay { day }).await?;
                records.retain(|r| (first..=last).contains(&r.id.raw()));
                records
            }
            _ => Vec::new(),
        };

        info!(id = %id, day = %day, records = records.len(), "Tab finalized");
        Ok(records)
    }

    /// Deletes a tab and its items, whatever its status.
    pub async fn delete(&self, id: TabId) -> DbResult<()> {
        let outcome = self.store.run(&Command::DeleteTab { id }).await?;
        if outcome.affected_rows == 0 {
            return Err(DbError::not_found("Tab", id));
        }

        debug!(id = %id, "Tab deleted");
        Ok(())
    }

    /// Sum of the tab's line totals, recomputed from its items.
    pub async fn total(&self, id: TabId) -> DbResult<Money> {
        Ok(self.detail(id).await?.total)
    }

    /// The tab with its items and total.
    pub async fn detail(&self, id: TabId) -> DbResult<TabDetail> {
        let tab = self.require(id).await?;
        let items: Vec<LineItem> = self
            .store
            .fetch_all(&Query::LineItemsForTab { tab_id: id })
            .await?;
        let total = tab_total(&items)?;

        Ok(TabDetail { tab, items, total })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{both_backends, legacy_backends};
    use comanda_core::{NewLineItem, ProductInput, MAX_PRICE_CENTS};

    async fn tab_with_items(store: &Store) -> TabId {
        store
            .products()
            .upsert(ProductInput::new("Coxinha", 350))
            .await
            .unwrap();
        store
            .products()
            .upsert(ProductInput::new("Pastel", 500))
            .await
            .unwrap();

        let tab = store.tabs().create("Mesa 4").await.unwrap();
        store
            .line_items()
            .add(NewLineItem::new(tab, "Coxinha", 2))
            .await
            .unwrap();
        store
            .line_items()
            .add(NewLineItem::new(tab, "Pastel", 1))
            .await
            .unwrap();
        tab
    }

    #[tokio::test]
    async fn test_total_is_exact() {
        for store in both_backends().await {
            let tab = tab_with_items(&store).await;

            let total = store.tabs().total(tab).await.unwrap();
            assert_eq!(total.cents(), 1200);
            assert_eq!(total.to_string(), "12.00");

            let detail = store.tabs().detail(tab).await.unwrap();
            assert_eq!(detail.items.len(), 2);
            assert_eq!(detail.total, total);
        }
    }

    #[tokio::test]
    async fn test_delete_cascades_to_items() {
        for store in both_backends().await {
            let tab = tab_with_items(&store).await;
            let other = store.tabs().create("Mesa 5").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(other, "Pastel", 3))
                .await
                .unwrap();

            store.tabs().delete(tab).await.unwrap();

            assert!(store.tabs().get(tab).await.unwrap().is_none());
            assert!(store.line_items().list_for_tab(tab).await.unwrap().is_empty());

            let remaining = store.line_items().list_all().await.unwrap();
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].tab_id, other);

            assert!(matches!(
                store.tabs().delete(tab).await.unwrap_err(),
                DbError::NotFound { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_close_keeps_row_and_happens_once() {
        for store in both_backends().await {
            let tab = tab_with_items(&store).await;

            store.tabs().close(tab).await.unwrap();

            let closed = store.tabs().get(tab).await.unwrap().unwrap();
            assert_eq!(closed.status, TabStatus::Closed);
            assert!(closed.closed_at.is_some());
            assert!(store.tabs().list_open().await.unwrap().is_empty());
            assert_eq!(store.tabs().list_closed().await.unwrap().len(), 1);

            let err = store.tabs().close(tab).await.unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::TabNotOpen { .. })));

            // Items survive closing
            assert_eq!(store.tabs().total(tab).await.unwrap().cents(), 1200);
        }
    }

    #[tokio::test]
    async fn test_finalize_writes_sales_and_deletes_tab() {
        let day: NaiveDate = "2026-10-19".parse().unwrap();

        for store in both_backends().await {
            let tab = tab_with_items(&store).await;

            let records = store.tabs().finalize(tab, day).await.unwrap();
            assert_eq!(records.len(), 2);
            assert!(records.iter().all(|r| r.tab_name == "Mesa 4" && r.day == day));

            assert!(store.tabs().get(tab).await.unwrap().is_none());
            assert!(store.line_items().list_all().await.unwrap().is_empty());

            let stored = store.sales().list_for_day(day).await.unwrap();
            assert_eq!(stored, records);
        }
    }

    #[tokio::test]
    async fn test_closed_tab_cannot_be_finalized() {
        for store in both_backends().await {
            let tab = tab_with_items(&store).await;
            store.tabs().close(tab).await.unwrap();

            let err = store
                .tabs()
                .finalize(tab, "2026-10-19".parse().unwrap())
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::TabNotOpen { .. })));
        }
    }

    #[tokio::test]
    async fn test_finalize_happens_once() {
        let day: NaiveDate = "2026-10-19".parse().unwrap();

        for store in both_backends().await {
            let tab = tab_with_items(&store).await;
            store.tabs().finalize(tab, day).await.unwrap();

            let err = store.tabs().finalize(tab, day).await.unwrap_err();
            assert!(matches!(err, DbError::NotFound { .. }));
            assert_eq!(store.sales().list_all().await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_finalize_empty_tab_writes_nothing() {
        for store in both_backends().await {
            let tab = store.tabs().create("Balcão").await.unwrap();

            let records = store
                .tabs()
                .finalize(tab, "2026-10-19".parse().unwrap())
                .await
                .unwrap();
            assert!(records.is_empty());
            assert!(store.tabs().get(tab).await.unwrap().is_none());
            assert!(store.sales().list_all().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_finalize_returns_only_its_own_records() {
        let day: NaiveDate = "2026-10-19".parse().unwrap();

        for store in both_backends().await {
            let first = tab_with_items(&store).await;
            let second = store.tabs().create("Mesa 9").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(second, "Pastel", 4))
                .await
                .unwrap();

            store.tabs().finalize(first, day).await.unwrap();
            let records = store.tabs().finalize(second, day).await.unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(records[0].tab_name, "Mesa 9");
            assert_eq!(records[0].quantity, 4);
            assert_eq!(store.sales().list_for_day(day).await.unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_legacy_rows_without_status_list_as_open() {
        for store in legacy_backends().await {
            let names: Vec<String> = store
                .tabs()
                .list_open()
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.name)
                .collect();
            assert_eq!(names, vec!["Mesa Velha"], "{}", store.kind());
        }
    }

    #[tokio::test]
    async fn test_price_too_large_for_totals_is_rejected() {
        for store in both_backends().await {
            let err = store
                .products()
                .upsert(ProductInput::new("Caro", i64::MAX / 2))
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

            store
                .products()
                .upsert(ProductInput::new("Caro", MAX_PRICE_CENTS))
                .await
                .unwrap();
            let tab = store.tabs().create("Mesa 1").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(tab, "Caro", 3))
                .await
                .unwrap();
            assert_eq!(store.tabs().total(tab).await.unwrap().cents(), 3 * MAX_PRICE_CENTS);
        }
    }

    #[tokio::test]
    async fn test_overflowing_total_is_an_error() {
        for store in both_backends().await {
            let tab = store.tabs().create("Mesa 1").await.unwrap();
            // Written straight through the store, as a damaged file could hold it
            store
                .run(&Command::InsertLineItem {
                    tab_id: tab,
                    product_id: None,
                    product_name: "Caro".into(),
                    quantity: 3,
                    unit_price_cents: i64::MAX / 2,
                    note: None,
                    at: Utc::now(),
                })
                .await
                .unwrap();

            let err = store.tabs().total(tab).await.unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::AmountOverflow { .. })));
            assert!(store.reports().dashboard().await.is_err());
        }
    }

    #[tokio::test]
    async fn test_open_tabs_sorted_by_folded_name() {
        for store in both_backends().await {
            for name in ["mesa 2", "Ávila", "Mesa 1", "avila"] {
                store.tabs().create(name).await.unwrap();
            }

            let names: Vec<String> = store
                .tabs()
                .list_open()
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.name)
                .collect();
            // Equal keys keep insertion order
            assert_eq!(names, vec!["Ávila", "avila", "Mesa 1", "mesa 2"]);
        }
    }
}
