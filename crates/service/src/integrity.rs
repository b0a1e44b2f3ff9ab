//! Order integrity checks against the current catalog.
//!
//! [`validate_and_enrich`] is the only entry point used by the workflow; the
//! pure rules are exposed separately so they can be exercised without a store.

use model::api::OrderItemRequest;
use model::{NewOrderItem, Product};
use repository::ProductsRepository;
use rust_decimal::Decimal;

use crate::ServiceError;

/// Allowed slack between the declared and computed order totals (one cent).
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Allowed relative drift between submitted and current unit price (5%).
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

fn out_of_range() -> ServiceError {
    ServiceError::Validation("order amounts are out of range".into())
}

/// Fails with [`ServiceError::TotalMismatch`] when `Σ price × quantity` is more
/// than [`TOTAL_TOLERANCE`] away from the declared total.
pub fn check_total(items: &[OrderItemRequest], declared_total: Decimal) -> Result<Decimal, ServiceError> {
    let computed = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
        .ok_or_else(out_of_range)?;
    let drift = computed.checked_sub(declared_total).ok_or_else(out_of_range)?;
    if drift.abs() > TOTAL_TOLERANCE {
        return Err(ServiceError::TotalMismatch {
            expected: computed,
            received: declared_total,
        });
    }
    Ok(computed)
}

/// Checks one requested line against the product it references.
///
/// A `stock_count` of zero means the product does not track stock; `in_stock`
/// is the authoritative availability flag.
pub fn check_line(product: &Product, item: &OrderItemRequest) -> Result<(), ServiceError> {
    if !product.in_stock {
        return Err(ServiceError::OutOfStock {
            product: product.name.clone(),
        });
    }

    if product.stock_count > 0 && product.stock_count < item.quantity {
        return Err(ServiceError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock_count,
            requested: item.quantity,
        });
    }

    if price_drift_exceeded(product.price, item.price).ok_or_else(out_of_range)? {
        return Err(ServiceError::PriceMismatch {
            product: product.name.clone(),
            current: product.price,
            submitted: item.price,
        });
    }

    Ok(())
}

/// `None` when the drift cannot be represented.
fn price_drift_exceeded(current: Decimal, submitted: Decimal) -> Option<bool> {
    if current.is_zero() {
        return Some(!submitted.is_zero());
    }
    let drift = current.checked_sub(submitted)?.abs().checked_div(current)?;
    Some(drift > PRICE_TOLERANCE)
}

/// Line-item snapshot for a validated request line.
pub fn enrich(product: &Product, item: &OrderItemRequest) -> NewOrderItem {
    NewOrderItem {
        product_id: product.id,
        name: product.name.clone(),
        price: item.price,
        quantity: item.quantity,
        image: product.primary_image().to_string(),
    }
}

/// Validates an order request against current catalog state and returns the
/// line-item snapshots to persist, in request order.
///
/// Every product is read once. Nothing is enriched unless every line passes.
pub async fn validate_and_enrich<P>(
    products: &P,
    items: &[OrderItemRequest],
    declared_total: Decimal,
) -> Result<Vec<NewOrderItem>, ServiceError>
where
    P: ProductsRepository + ?Sized,
{
    if items.is_empty() {
        return Err(ServiceError::Validation("order has no items".into()));
    }

    check_total(items, declared_total)?;

    let mut validated = Vec::with_capacity(items.len());
    for item in items {
        let product = products
            .get_by_id(item.product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(item.product_id))?;
        check_line(&product, item)?;
        validated.push((product, item));
    }

    Ok(validated
        .into_iter()
        .map(|(product, item)| enrich(&product, item))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::InMemoryStore;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn product(price: Decimal, stock_count: i32, in_stock: bool) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Lantern".to_string(),
            price,
            stock_count,
            in_stock,
            images: vec!["lantern-front.png".to_string(), "lantern-back.png".to_string()],
        }
    }

    fn line(product_id: Uuid, quantity: i32, price: Decimal) -> OrderItemRequest {
        OrderItemRequest {
            product_id,
            quantity,
            price,
        }
    }

    #[test]
    fn test_tolerance_constants() {
        assert_eq!(TOTAL_TOLERANCE, dec!(0.01));
        assert_eq!(PRICE_TOLERANCE, dec!(0.05));
    }

    #[test]
    fn test_total_within_one_cent_passes() {
        let items = [line(Uuid::new_v4(), 2, dec!(10.00)), line(Uuid::new_v4(), 1, dec!(5.00))];
        assert_eq!(check_total(&items, dec!(25.00)).unwrap(), dec!(25.00));
        assert!(check_total(&items, dec!(25.01)).is_ok());
        assert!(check_total(&items, dec!(24.99)).is_ok());
    }

    #[test]
    fn test_total_two_cents_off_fails() {
        let items = [line(Uuid::new_v4(), 2, dec!(10.00)), line(Uuid::new_v4(), 1, dec!(5.00))];
        let err = check_total(&items, dec!(25.02)).unwrap_err();
        assert_eq!(err.kind(), "TotalMismatch");
        assert!(check_total(&items, dec!(25.50)).is_err());
    }

    #[test]
    fn test_out_of_stock_regardless_of_quantity() {
        let p = product(dec!(10), 100, false);
        for quantity in [1, 5, 1000] {
            let err = check_line(&p, &line(p.id, quantity, dec!(10))).unwrap_err();
            assert_eq!(err.kind(), "OutOfStock");
        }
    }

    #[test]
    fn test_zero_stock_count_is_untracked() {
        let p = product(dec!(10), 0, true);
        assert!(check_line(&p, &line(p.id, 500, dec!(10))).is_ok());
    }

    #[test]
    fn test_insufficient_tracked_stock() {
        let p = product(dec!(10), 3, true);
        let err = check_line(&p, &line(p.id, 5, dec!(10))).unwrap_err();
        assert_eq!(err.kind(), "InsufficientStock");
        assert!(check_line(&p, &line(p.id, 3, dec!(10))).is_ok());
    }

    #[test]
    fn test_price_tolerance() {
        let p = product(dec!(100.00), 0, true);
        assert!(check_line(&p, &line(p.id, 1, dec!(96.00))).is_ok());
        assert!(check_line(&p, &line(p.id, 1, dec!(104.00))).is_ok());
        assert!(check_line(&p, &line(p.id, 1, dec!(95.00))).is_ok());

        let err = check_line(&p, &line(p.id, 1, dec!(94.00))).unwrap_err();
        assert_eq!(err.kind(), "PriceMismatch");
        assert!(check_line(&p, &line(p.id, 1, dec!(106.00))).is_err());
    }

    #[test]
    fn test_free_product_only_accepts_zero_price() {
        let p = product(Decimal::ZERO, 0, true);
        assert!(check_line(&p, &line(p.id, 1, Decimal::ZERO)).is_ok());
        assert!(check_line(&p, &line(p.id, 1, dec!(0.50))).is_err());
    }

    #[test]
    fn test_total_overflow_is_validation_error() {
        let items = [line(Uuid::new_v4(), i32::MAX, Decimal::MAX)];
        let err = check_total(&items, Decimal::ONE).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let items = [line(Uuid::new_v4(), 1, Decimal::MAX), line(Uuid::new_v4(), 1, Decimal::MAX)];
        assert_eq!(check_total(&items, Decimal::ONE).unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn test_price_drift_overflow_is_validation_error() {
        let p = product(dec!(0.01), 0, true);
        let err = check_line(&p, &line(p.id, 1, Decimal::MAX)).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[tokio::test]
    async fn test_enrichment_copies_name_and_first_image() {
        let store = InMemoryStore::new();
        let p = product(dec!(10.00), 0, true);
        store.insert_product(p.clone()).await;

        let items = [line(p.id, 2, dec!(9.80))];
        let enriched = validate_and_enrich(&store, &items, dec!(19.60)).await.unwrap();

        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].name, "Lantern");
        assert_eq!(enriched[0].image, "lantern-front.png");
        assert_eq!(enriched[0].price, dec!(9.80));
        assert_eq!(enriched[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_unknown_product_fails_whole_request() {
        let store = InMemoryStore::new();
        let p = product(dec!(10.00), 0, true);
        store.insert_product(p.clone()).await;

        let missing = Uuid::new_v4();
        let items = [line(p.id, 1, dec!(10.00)), line(missing, 1, dec!(10.00))];
        let err = validate_and_enrich(&store, &items, dec!(20.00)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ProductNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_total_checked_before_catalog() {
        let store = InMemoryStore::new();
        let items = [line(Uuid::new_v4(), 1, dec!(10.00))];
        let err = validate_and_enrich(&store, &items, dec!(11.00)).await.unwrap_err();
        assert_eq!(err.kind(), "TotalMismatch");
    }
}
