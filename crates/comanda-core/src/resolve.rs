//! # Name Folding & Product Resolution
//!
//! ## Folding
//! Names are compared through a folded key: Unicode NFD, combining marks
//! dropped, lowercased, inner whitespace collapsed. `"Açaí  Grande"` and
//! `"acai grande"` fold to the same key. Both backends store and sort by this
//! key, so name order is identical whether SQLite or the emulator is active.
//!
//! ## Resolution Order
//! ```text
//! reference "Cox"
//!      │
//!      ├── 1. exact id ("2" → product 2) ──────────────► found
//!      │
//!      ├── 2. exact folded name ("coxinha") ───────────► found
//!      │
//!      └── 3. prefix of folded name or id text
//!             ├── 0 matches ──► ProductNotFound
//!             ├── 1 match  ──► found
//!             └── 2+       ──► AmbiguousReference (never guess)
//! ```

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, ProductId};

/// Folds a name into its comparison key.
///
/// ## Example
/// ```rust
/// use comanda_core::fold_name;
///
/// assert_eq!(fold_name("  Pão de  Queijo "), "pao de queijo");
/// assert_eq!(fold_name("AÇAÍ"), fold_name("acai"));
/// ```
pub fn fold_name(name: &str) -> String {
    let stripped: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a typed product reference against a catalog.
///
/// ## Returns
/// * `Ok(&Product)` - exactly one product matches
/// * `Err(CoreError::ProductNotFound)` - nothing matches
/// * `Err(CoreError::AmbiguousReference)` - several prefix matches
pub fn resolve_product<'a>(catalog: &'a [Product], reference: &str) -> CoreResult<&'a Product> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(CoreError::ProductNotFound(String::new()));
    }

    if let Ok(id) = reference.parse::<ProductId>() {
        if let Some(product) = catalog.iter().find(|p| p.id == id) {
            return Ok(product);
        }
    }

    let key = fold_name(reference);
    let keyed: Vec<(String, &Product)> = catalog
        .iter()
        .map(|p| (fold_name(&p.name), p))
        .collect();

    let exact: Vec<&Product> = keyed
        .iter()
        .filter(|(k, _)| *k == key)
        .map(|(_, p)| *p)
        .collect();
    if let Some(found) = single_match(reference, exact)? {
        return Ok(found);
    }

    let prefixed: Vec<&Product> = keyed
        .iter()
        .filter(|(k, p)| k.starts_with(&key) || p.id.to_string().starts_with(reference))
        .map(|(_, p)| *p)
        .collect();

    single_match(reference, prefixed)?
        .ok_or_else(|| CoreError::ProductNotFound(reference.to_string()))
}

fn single_match<'a>(
    reference: &str,
    matches: Vec<&'a Product>,
) -> CoreResult<Option<&'a Product>> {
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(CoreError::AmbiguousReference {
            reference: reference.to_string(),
            candidates: many.iter().map(|p| p.name.clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: i64, name: &str) -> Product {
        Product {
            id: ProductId::from_raw(id),
            name: name.to_string(),
            price_cents: 500,
            updated_at: Utc::now(),
        }
    }

    fn catalog() -> Vec<Product> {
        vec![product(1, "Coxinha"), product(2, "Coxinha Grande"), product(3, "Açaí")]
    }

    #[test]
    fn test_fold_name() {
        assert_eq!(fold_name("Coxinha"), "coxinha");
        assert_eq!(fold_name("Açaí"), "acai");
        assert_eq!(fold_name("  Refri   Lata "), "refri lata");
    }

    #[test]
    fn test_exact_name_beats_prefix_ambiguity() {
        let catalog = catalog();
        let found = resolve_product(&catalog, "Coxinha").unwrap();
        assert_eq!(found.id, ProductId::from_raw(1));

        let found = resolve_product(&catalog, "COXINHA").unwrap();
        assert_eq!(found.id, ProductId::from_raw(1));
    }

    #[test]
    fn test_ambiguous_prefix_fails() {
        let catalog = catalog();
        let err = resolve_product(&catalog, "Cox").unwrap_err();
        match err {
            CoreError::AmbiguousReference { reference, candidates } => {
                assert_eq!(reference, "Cox");
                assert_eq!(candidates, vec!["Coxinha", "Coxinha Grande"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let catalog = catalog();
        assert_eq!(
            resolve_product(&catalog, "coxinha g").unwrap().id,
            ProductId::from_raw(2)
        );
        assert_eq!(resolve_product(&catalog, "aca").unwrap().id, ProductId::from_raw(3));
    }

    #[test]
    fn test_resolve_by_id() {
        let catalog = catalog();
        assert_eq!(resolve_product(&catalog, "2").unwrap().name, "Coxinha Grande");

        let sparse = vec![product(15, "Pastel"), product(27, "Kibe")];
        assert_eq!(resolve_product(&sparse, "1").unwrap().name, "Pastel");
    }

    #[test]
    fn test_not_found() {
        let catalog = catalog();
        assert_eq!(
            resolve_product(&catalog, "Esfiha").unwrap_err(),
            CoreError::ProductNotFound("Esfiha".to_string())
        );
        assert!(matches!(
            resolve_product(&catalog, "  "),
            Err(CoreError::ProductNotFound(_))
        ));
        assert!(resolve_product(&[], "Coxinha").is_err());
    }
}
