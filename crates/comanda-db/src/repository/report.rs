//! # Report Repository
//!
//! Dashboard figures, recomputed from line items on every call.

use tracing::debug;

use comanda_core::{DashboardSummary, LineItem, Tab, TabStatus};

use crate::error::DbResult;
use crate::store::Query;
use crate::Store;

/// Repository for summary reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    store: Store,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(store: Store) -> Self {
        ReportRepository { store }
    }

    /// Tab counts, open/closed totals and the best sellers across all tabs.
    pub async fn dashboard(&self) -> DbResult<DashboardSummary> {
        let open: Vec<Tab> = self
            .store
            .fetch_all(&Query::TabsByStatus {
                status: TabStatus::Open,
            })
            .await?;
        let closed: Vec<Tab> = self
            .store
            .fetch_all(&Query::TabsByStatus {
                status: TabStatus::Closed,
            })
            .await?;

        let open_items: Vec<LineItem> = self
            .store
            .fetch_all(&Query::LineItemsForStatus {
                status: TabStatus::Open,
            })
            .await?;
        let closed_items: Vec<LineItem> = self
            .store
            .fetch_all(&Query::LineItemsForStatus {
                status: TabStatus::Closed,
            })
            .await?;

        let summary =
            DashboardSummary::compute(open.len(), &open_items, closed.len(), &closed_items)?;

        debug!(
            open_tabs = summary.open_tabs,
            closed_tabs = summary.closed_tabs,
            grand_total = %summary.grand_total,
            "Dashboard computed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::both_backends;
    use comanda_core::{NewLineItem, ProductInput};

    #[tokio::test]
    async fn test_dashboard_same_on_both_backends() {
        let mut summaries = Vec::new();

        for store in both_backends().await {
            for (name, price) in [("Coxinha", 350), ("Pastel", 500), ("Refri", 600)] {
                store
                    .products()
                    .upsert(ProductInput::new(name, price))
                    .await
                    .unwrap();
            }

            let open = store.tabs().create("Mesa 1").await.unwrap();
            let closed = store.tabs().create("Mesa 2").await.unwrap();
            let items = store.line_items();
            items.add(NewLineItem::new(open, "Coxinha", 2)).await.unwrap();
            items.add(NewLineItem::new(open, "Refri", 1)).await.unwrap();
            items.add(NewLineItem::new(closed, "Coxinha", 4)).await.unwrap();
            items.add(NewLineItem::new(closed, "Pastel", 1)).await.unwrap();
            store.tabs().close(closed).await.unwrap();

            let summary = store.reports().dashboard().await.unwrap();
            assert_eq!(summary.open_tabs, 1);
            assert_eq!(summary.closed_tabs, 1);
            assert_eq!(summary.open_total.cents(), 1300);
            assert_eq!(summary.closed_total.cents(), 1900);
            assert_eq!(summary.top_products[0].product_name, "Coxinha");
            assert_eq!(summary.top_products[0].quantity, 6);

            summaries.push(summary);
        }

        assert_eq!(summaries[0], summaries[1]);
    }
}
