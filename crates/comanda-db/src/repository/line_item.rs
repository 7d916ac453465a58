//! # Line Item Repository
//!
//! Adding and removing items on open tabs.
//!
//! ## Adding an Item
//! ```text
//! NewLineItem { tab, product_ref: "cox", quantity: 2 }
//!      │
//!      ├── quantity 1..=999, note length
//!      ├── tab exists and is open ─────────────► TabNotOpen
//!      ├── resolve "cox" against the catalog ──► ProductNotFound / Ambiguous
//!      │
//!      ▼
//! InsertLineItem { unit_price_cents: catalog price now (or override) }
//!      │
//!      ▼
//! later price changes never touch this item
//! ```

use chrono::Utc;
use tracing::debug;

use comanda_core::validation::{validate_note, validate_price_cents, validate_quantity};
use comanda_core::{
    CoreError, LineItem, LineItemId, NewLineItem, ProductInput, TabId, MAX_ITEM_QUANTITY,
};

use crate::error::{DbError, DbResult};
use crate::store::{Command, Query};
use crate::Store;

/// Repository for line item operations.
#[derive(Debug, Clone)]
pub struct LineItemRepository {
    store: Store,
}

impl LineItemRepository {
    /// Creates a new LineItemRepository.
    pub fn new(store: Store) -> Self {
        LineItemRepository { store }
    }

    /// Adds an item to an open tab, freezing the product's current price.
    ///
    /// ## Returns
    /// * `Ok(LineItemId)` - item stored
    /// * `Err(DbError::Core(ProductNotFound | AmbiguousReference))` - the
    ///   reference doesn't name exactly one product
    /// * `Err(DbError::Core(TabNotOpen))` - tab already closed
    /// * `Err(DbError::NotFound)` - no such tab
    pub async fn add(&self, item: NewLineItem) -> DbResult<LineItemId> {
        if item.quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: item.quantity,
                max: MAX_ITEM_QUANTITY,
            }
            .into());
        }
        validate_quantity(item.quantity)?;
        let note = validate_note(item.note.as_deref())?;
        if let Some(price) = item.unit_price_cents {
            validate_price_cents(price)?;
        }

        self.store.tabs().require_open(item.tab_id).await?;
        let product = self.store.products().resolve(&item.product_ref).await?;
        let unit_price_cents = item.unit_price_cents.unwrap_or(product.price_cents);

        let outcome = self
            .store
            .run(&Command::InsertLineItem {
                tab_id: item.tab_id,
                product_id: Some(product.id),
                product_name: product.name,
                quantity: item.quantity,
                unit_price_cents,
                note,
                at: Utc::now(),
            })
            .await?;
        let id = LineItemId::from_raw(outcome.require_inserted_id()?);

        debug!(
            id = %id,
            tab_id = %item.tab_id,
            quantity = item.quantity,
            unit_price_cents,
            "Line item added"
        );
        Ok(id)
    }

    /// Like [`add`](Self::add), but an unknown product with an explicit price
    /// is registered in the catalog first.
    pub async fn add_or_register(&self, item: NewLineItem) -> DbResult<LineItemId> {
        match self.add(item.clone()).await {
            Err(DbError::Core(CoreError::ProductNotFound(_))) => {
                let Some(price) = item.unit_price_cents else {
                    let reference = item.product_ref.trim().to_string();
                    return Err(CoreError::ProductNotFound(reference).into());
                };

                let product_id = self
                    .store
                    .products()
                    .upsert(ProductInput::new(item.product_ref.clone(), price))
                    .await?;
                debug!(id = %product_id, "Product registered from tab");

                self.add(NewLineItem {
                    product_ref: product_id.to_string(),
                    ..item
                })
                .await
            }
            other => other,
        }
    }

    /// Items of one tab, in the order they were added.
    pub async fn list_for_tab(&self, tab_id: TabId) -> DbResult<Vec<LineItem>> {
        self.store
            .fetch_all(&Query::LineItemsForTab { tab_id })
            .await
    }

    /// Every item of every tab.
    pub async fn list_all(&self) -> DbResult<Vec<LineItem>> {
        self.store.fetch_all(&Query::AllLineItems).await
    }

    /// Removes an item from an open tab.
    pub async fn remove(&self, id: LineItemId) -> DbResult<()> {
        let item: LineItem = self
            .store
            .fetch_optional(&Query::LineItemById { id })
            .await?
            .ok_or_else(|| DbError::not_found("Line item", id))?;

        self.store.tabs().require_open(item.tab_id).await?;
        self.store.run(&Command::DeleteLineItem { id }).await?;

        debug!(id = %id, tab_id = %item.tab_id, "Line item removed");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::both_backends;
    use comanda_core::ValidationError;

    #[tokio::test]
    async fn test_price_is_frozen_at_insert() {
        for store in both_backends().await {
            let coxinha = store
                .products()
                .upsert(ProductInput::new("Coxinha", 350))
                .await
                .unwrap();
            let tab = store.tabs().create("Mesa 1").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(tab, "Coxinha", 2))
                .await
                .unwrap();

            store
                .products()
                .upsert(ProductInput::new("Coxinha", 400).with_id(coxinha))
                .await
                .unwrap();

            let items = store.line_items().list_for_tab(tab).await.unwrap();
            assert_eq!(items[0].unit_price_cents, 350);
            assert_eq!(items[0].product_id, Some(coxinha));
            assert_eq!(store.tabs().total(tab).await.unwrap().cents(), 700);
        }
    }

    #[tokio::test]
    async fn test_items_survive_product_deletion() {
        for store in both_backends().await {
            let pastel = store
                .products()
                .upsert(ProductInput::new("Pastel", 500))
                .await
                .unwrap();
            let tab = store.tabs().create("Mesa 2").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(tab, "pastel", 1).with_note("sem cebola"))
                .await
                .unwrap();

            store.products().remove(pastel).await.unwrap();

            let items = store.line_items().list_for_tab(tab).await.unwrap();
            assert_eq!(items[0].product_name, "Pastel");
            assert_eq!(items[0].note.as_deref(), Some("sem cebola"));
        }
    }

    #[tokio::test]
    async fn test_add_rejections() {
        for store in both_backends().await {
            store
                .products()
                .upsert(ProductInput::new("Coxinha", 350))
                .await
                .unwrap();
            store
                .products()
                .upsert(ProductInput::new("Coxinha Grande", 600))
                .await
                .unwrap();
            let tab = store.tabs().create("Mesa 3").await.unwrap();
            let items = store.line_items();

            let ambiguous = items.add(NewLineItem::new(tab, "Cox", 1)).await.unwrap_err();
            assert!(matches!(
                ambiguous,
                DbError::Core(CoreError::AmbiguousReference { .. })
            ));

            let too_many = items.add(NewLineItem::new(tab, "Coxinha", 1000)).await.unwrap_err();
            assert!(matches!(
                too_many,
                DbError::Core(CoreError::QuantityTooLarge { .. })
            ));

            let zero = items.add(NewLineItem::new(tab, "Coxinha", 0)).await.unwrap_err();
            assert!(matches!(
                zero,
                DbError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
            ));

            store.tabs().close(tab).await.unwrap();
            let closed = items.add(NewLineItem::new(tab, "Coxinha", 1)).await.unwrap_err();
            assert!(matches!(closed, DbError::Core(CoreError::TabNotOpen { .. })));

            assert!(items.list_all().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_price_override() {
        for store in both_backends().await {
            store
                .products()
                .upsert(ProductInput::new("Refri", 600))
                .await
                .unwrap();
            let tab = store.tabs().create("Balcão").await.unwrap();
            store
                .line_items()
                .add(NewLineItem::new(tab, "Refri", 2).with_price(0))
                .await
                .unwrap();

            assert!(store.tabs().total(tab).await.unwrap().is_zero());
        }
    }

    #[tokio::test]
    async fn test_add_or_register() {
        for store in both_backends().await {
            let tab = store.tabs().create("Mesa 6").await.unwrap();
            let items = store.line_items();

            let err = items
                .add_or_register(NewLineItem::new(tab, "Esfiha", 1))
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::ProductNotFound(_))));

            items
                .add_or_register(NewLineItem::new(tab, "Esfiha", 3).with_price(450))
                .await
                .unwrap();

            let product = store.products().find_by_name("esfiha").await.unwrap().unwrap();
            assert_eq!(product.price_cents, 450);
            assert_eq!(store.tabs().total(tab).await.unwrap().cents(), 1350);
        }
    }

    #[tokio::test]
    async fn test_remove_only_from_open_tabs() {
        for store in both_backends().await {
            store
                .products()
                .upsert(ProductInput::new("Coxinha", 350))
                .await
                .unwrap();
            let tab = store.tabs().create("Mesa 7").await.unwrap();
            let first = store
                .line_items()
                .add(NewLineItem::new(tab, "Coxinha", 1))
                .await
                .unwrap();
            let second = store
                .line_items()
                .add(NewLineItem::new(tab, "Coxinha", 2))
                .await
                .unwrap();

            store.line_items().remove(first).await.unwrap();
            assert_eq!(store.line_items().list_for_tab(tab).await.unwrap().len(), 1);

            store.tabs().close(tab).await.unwrap();
            let err = store.line_items().remove(second).await.unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::TabNotOpen { .. })));

            assert!(matches!(
                store.line_items().remove(first).await.unwrap_err(),
                DbError::NotFound { .. }
            ));
        }
    }
}
