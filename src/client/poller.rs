use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::api::BlazeApi;
use super::QueryClient;

/// Refresh the notifications entry every `every` until the handle is aborted.
/// Failed polls are logged and retried on the next tick.
pub fn spawn_notification_poller<A>(client: Arc<QueryClient<A>>, every: Duration) -> JoinHandle<()>
where
    A: BlazeApi + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match client.notifications().await {
                Ok(list) => {
                    let unread = list.iter().filter(|n| !n.read).count();
                    tracing::debug!("Polled {} notifications ({} unread)", list.len(), unread);
                }
                Err(e) => tracing::warn!("Notification poll failed: {}", e),
            }
        }
    })
}
