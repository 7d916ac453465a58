//! # Product Repository
//!
//! Store operations for the catalog.
//!
//! ## Key Operations
//! - Lookup by id, folded name, prefix or substring
//! - Upsert keyed by folded name (names are unique ignoring case and accents)
//! - Resolution of a typed reference to exactly one product
//!
//! ## Name Matching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  User types: "pao de"                                                  │
//! │       │                                                                 │
//! │       ▼  fold_name                                                     │
//! │  "pao de" ──► prefix on name_key                                       │
//! │                                                                         │
//! │  name            name_key                                              │
//! │  Pão de Queijo   pao de queijo   ← MATCH                               │
//! │  Pão de Mel      pao de mel      ← MATCH                               │
//! │  Pastel          pastel                                                │
//! │                                                                         │
//! │  Results ordered by name_key, then id                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::debug;

use comanda_core::validation::{validate_price_cents, validate_product_name, validate_product_ref};
use comanda_core::{resolve_product, Product, ProductId, ProductInput};

use crate::error::{DbError, DbResult};
use crate::store::{Command, Query};
use crate::Store;

/// Repository for catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = store.products();
///
/// let id = repo.upsert(ProductInput::new("Coxinha", 350)).await?;
/// let found = repo.resolve("cox").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    store: Store,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(store: Store) -> Self {
        ProductRepository { store }
    }

    /// Lists the whole catalog by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        self.store.fetch_all(&Query::AllProducts).await
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, id: ProductId) -> DbResult<Option<Product>> {
        self.store.fetch_optional(&Query::ProductById { id }).await
    }

    /// Finds a product whose name equals `name` ignoring case and accents.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Product>> {
        self.store
            .fetch_optional(&Query::ProductByName {
                name: name.to_string(),
            })
            .await
    }

    /// Products whose folded name starts with the folded `prefix`.
    ///
    /// An empty prefix lists the whole catalog.
    pub async fn search_prefix(&self, prefix: &str) -> DbResult<Vec<Product>> {
        debug!(prefix = %prefix, "Searching products by prefix");
        self.store
            .fetch_all(&Query::ProductsByNamePrefix {
                prefix: prefix.to_string(),
            })
            .await
    }

    /// Products whose folded name contains the folded `text`.
    pub async fn search_containing(&self, text: &str) -> DbResult<Vec<Product>> {
        debug!(text = %text, "Searching products by substring");
        self.store
            .fetch_all(&Query::ProductsContaining {
                text: text.to_string(),
            })
            .await
    }

    /// Creates or updates a catalog entry.
    ///
    /// ## Matching
    /// - With `id`: that product is renamed and repriced
    /// - Without `id`: an entry with the same folded name gets the new
    ///   price, otherwise a new entry is created
    ///
    /// Line items already on tabs keep their frozen price either way.
    ///
    /// ## Returns
    /// * `Ok(ProductId)` - id of the created or updated product
    /// * `Err(DbError::UniqueViolation)` - rename onto another product's name
    /// * `Err(DbError::NotFound)` - `id` given but absent
    pub async fn upsert(&self, input: ProductInput) -> DbResult<ProductId> {
        let name = validate_product_name(&input.name)?;
        validate_price_cents(input.price_cents)?;

        let existing = self.find_by_name(&name).await?;
        let at = Utc::now();

        match input.id {
            Some(id) => {
                if let Some(other) = existing.filter(|p| p.id != id) {
                    return Err(DbError::duplicate("product name", other.name));
                }

                let outcome = self
                    .store
                    .run(&Command::UpdateProduct {
                        id,
                        name,
                        price_cents: input.price_cents,
                        at,
                    })
                    .await?;
                if outcome.affected_rows == 0 {
                    return Err(DbError::not_found("Product", id));
                }

                debug!(id = %id, price_cents = input.price_cents, "Product updated");
                Ok(id)
            }

            None => match existing {
                Some(product) => {
                    self.store
                        .run(&Command::UpdateProduct {
                            id: product.id,
                            name: product.name,
                            price_cents: input.price_cents,
                            at,
                        })
                        .await?;

                    debug!(id = %product.id, price_cents = input.price_cents, "Product repriced");
                    Ok(product.id)
                }
                None => {
                    let outcome = self
                        .store
                        .run(&Command::InsertProduct {
                            name,
                            price_cents: input.price_cents,
                            at,
                        })
                        .await?;
                    let id = ProductId::from_raw(outcome.require_inserted_id()?);

                    debug!(id = %id, price_cents = input.price_cents, "Product created");
                    Ok(id)
                }
            },
        }
    }

    /// Deletes a catalog entry. Line items that reference it are untouched.
    pub async fn remove(&self, id: ProductId) -> DbResult<()> {
        let outcome = self.store.run(&Command::DeleteProduct { id }).await?;
        if outcome.affected_rows == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id = %id, "Product removed");
        Ok(())
    }

    /// Resolves a typed reference (id, name, or unambiguous prefix).
    ///
    /// ## Returns
    /// * `Ok(Product)` - exactly one match
    /// * `Err(DbError::Core(ProductNotFound))` - no match
    /// * `Err(DbError::Core(AmbiguousReference))` - several prefix matches
    pub async fn resolve(&self, reference: &str) -> DbResult<Product> {
        let reference = validate_product_ref(reference)?;
        let catalog = self.list().await?;

        let product = resolve_product(&catalog, &reference)?;
        debug!(reference = %reference, id = %product.id, "Product reference resolved");
        Ok(product.clone())
    }

    /// Number of catalog entries.
    pub async fn count(&self) -> DbResult<usize> {
        Ok(self.list().await?.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::both_backends;
    use comanda_core::CoreError;

    #[tokio::test]
    async fn test_upsert_matches_by_folded_name() {
        for store in both_backends().await {
            let repo = store.products();

            let first = repo.upsert(ProductInput::new("Pão de Queijo", 400)).await.unwrap();
            let again = repo.upsert(ProductInput::new("PAO DE QUEIJO", 450)).await.unwrap();

            assert_eq!(first, again);
            assert_eq!(repo.count().await.unwrap(), 1);

            let product = repo.get(first).await.unwrap().unwrap();
            assert_eq!(product.name, "Pão de Queijo");
            assert_eq!(product.price_cents, 450);
        }
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_rejected() {
        for store in both_backends().await {
            let repo = store.products();
            repo.upsert(ProductInput::new("Coxinha", 350)).await.unwrap();
            let pastel = repo.upsert(ProductInput::new("Pastel", 500)).await.unwrap();

            let err = repo
                .upsert(ProductInput::new("coxinha", 500).with_id(pastel))
                .await
                .unwrap_err();
            assert!(matches!(err, DbError::UniqueViolation { .. }));

            let renamed = repo
                .upsert(ProductInput::new("Pastel de Carne", 550).with_id(pastel))
                .await
                .unwrap();
            assert_eq!(renamed, pastel);
        }
    }

    #[tokio::test]
    async fn test_search_ignores_case_and_accents() {
        for store in both_backends().await {
            let repo = store.products();
            for (name, price) in [("Pão de Queijo", 400), ("Pão de Mel", 300), ("Pastel", 500)] {
                repo.upsert(ProductInput::new(name, price)).await.unwrap();
            }

            let prefix: Vec<String> = repo
                .search_prefix("PAO DE")
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.name)
                .collect();
            assert_eq!(prefix, vec!["Pão de Mel", "Pão de Queijo"]);

            let containing = repo.search_containing("queijo").await.unwrap();
            assert_eq!(containing.len(), 1);

            assert_eq!(repo.search_prefix("").await.unwrap().len(), 3);
            assert!(repo.find_by_name("pastel").await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_resolution() {
        for store in both_backends().await {
            let repo = store.products();
            let coxinha = repo.upsert(ProductInput::new("Coxinha", 350)).await.unwrap();
            repo.upsert(ProductInput::new("Coxinha Grande", 600)).await.unwrap();

            assert_eq!(repo.resolve("Coxinha").await.unwrap().id, coxinha);
            assert_eq!(repo.resolve(" coxinha ").await.unwrap().id, coxinha);
            assert_eq!(repo.resolve(&coxinha.to_string()).await.unwrap().id, coxinha);
            assert_eq!(coxinha.to_string(), "1");

            match repo.resolve("Cox").await.unwrap_err() {
                DbError::Core(CoreError::AmbiguousReference { candidates, .. }) => {
                    assert_eq!(candidates, vec!["Coxinha", "Coxinha Grande"]);
                }
                other => panic!("unexpected error: {other:?}"),
            }

            assert!(matches!(
                repo.resolve("Esfiha").await.unwrap_err(),
                DbError::Core(CoreError::ProductNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_remove() {
        for store in both_backends().await {
            let repo = store.products();
            let id = repo.upsert(ProductInput::new("Refri", 600)).await.unwrap();

            repo.remove(id).await.unwrap();
            assert!(repo.get(id).await.unwrap().is_none());
            assert!(matches!(
                repo.remove(id).await.unwrap_err(),
                DbError::NotFound { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        for store in both_backends().await {
            let repo = store.products();
            assert!(repo.upsert(ProductInput::new("   ", 100)).await.is_err());
            assert!(repo.upsert(ProductInput::new("Suco", -1)).await.is_err());
            assert_eq!(repo.count().await.unwrap(), 0);
        }
    }
}
