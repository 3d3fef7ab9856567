use std::time::Duration;

use uuid::Uuid;

use crate::{commands, establish_connection};

/// Grace period between reservation creation and the unpaid-cancellation
/// check. Fixed, not per-reservation.
pub const AUTO_CANCEL_DELAY: Duration = Duration::from_secs(10 * 60);

/// Arms exactly one fire of `callback(reservation_id)` after `delay`.
///
/// There is no cancel-timer primitive and timers do not survive a restart;
/// correctness relies on the callback being idempotent at fire time.
pub fn schedule_once_after_delay<F>(delay: Duration, callback: F, reservation_id: Uuid)
where
    F: FnOnce(Uuid) + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        callback(reservation_id);
    });
}

/// Arms the deferred unpaid-cancellation check for a freshly created
/// reservation. The callback opens its own connection, so its transaction
/// commits independently of whatever armed it; failures are logged and
/// swallowed since nothing is waiting on the timer.
pub fn schedule_auto_cancel(reservation_id: Uuid) {
    schedule_once_after_delay(
        AUTO_CANCEL_DELAY,
        |id| {
            let conn = &mut establish_connection();
            if let Err(err) = commands::auto_cancel(conn, id) {
                tracing::error!(reservation_id = %id, "auto-cancel failed: {err}");
            }
        },
        reservation_id,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once_after_the_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let witness = fired.clone();
        schedule_once_after_delay(
            Duration::from_secs(600),
            move |_| {
                witness.fetch_add(1, Ordering::SeqCst);
            },
            Uuid::new_v4(),
        );
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(599)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3600)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
