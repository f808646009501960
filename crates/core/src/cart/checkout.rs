use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::order::{OrderId, OrderProjection};
use crate::domain::session::Session;
use crate::ports::{OrderSink, PortError};

const RETRY_BACKOFF_MS: u64 = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Nothing to submit. Not an error and no order is created.
    EmptyCart,
    Placed { order_id: OrderId, order: OrderProjection },
    Failed { order: OrderProjection, attempts: u32, error: PortError },
}

pub(crate) async fn checkout(
    session: &Session,
    sink: &dyn OrderSink,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> CheckoutOutcome {
    let Some(order) = OrderProjection::from_cart(&session.key, &session.cart, now) else {
        info!(
            event_name = "cart.checkout.empty",
            session_key = %session.key,
            "checkout requested on empty cart"
        );
        return CheckoutOutcome::EmptyCart;
    };

    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match sink.submit(&order).await {
            Ok(order_id) => {
                info!(
                    event_name = "cart.checkout.placed",
                    session_key = %session.key,
                    order_ref = %order.order_ref,
                    order_id = %order_id.0,
                    total = %order.total,
                    attempt,
                    "order submitted"
                );
                return CheckoutOutcome::Placed { order_id, order };
            }
            Err(error) => {
                warn!(
                    event_name = "cart.checkout.submit_failed",
                    session_key = %session.key,
                    order_ref = %order.order_ref,
                    attempt,
                    error = %error,
                    "order submission failed"
                );
                let retryable = !matches!(error, PortError::Rejected(_));
                if !retryable || attempt >= max_attempts {
                    return CheckoutOutcome::Failed { order, attempts: attempt, error };
                }
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)))
                    .await;
            }
        }
    }
}
