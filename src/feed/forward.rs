//! Pipeline → broker forwarding

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::report::SharedReport;
use crate::broker::{Broker, BrokerError};

/// Spawn the task that hands every new pipeline report to the broker.
///
/// Ends when the pipeline side of the channel is dropped or the broker stops.
pub fn forward_reports(
    mut reports: watch::Receiver<Option<SharedReport>>,
    broker: Arc<Broker<SharedReport>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while reports.changed().await.is_ok() {
            let Some(report) = reports.borrow_and_update().clone() else {
                continue;
            };

            match broker.publish(report) {
                Ok(()) => {}
                Err(BrokerError::Stopped) => break,
                Err(e) => tracing::debug!(error = %e, "Report not forwarded"),
            }
        }
        tracing::debug!("Report forwarder finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConfig;
    use crate::feed::{Report, Sample};
    use std::time::Duration;

    #[tokio::test]
    async fn test_forwards_each_report() {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        broker.start().await.unwrap();
        let mut sub = broker.subscribe().await.unwrap();

        let (tx, rx) = watch::channel(None);
        let forwarder = forward_reports(rx, Arc::clone(&broker));

        let report = Arc::new(Report::new(
            Sample::sized(1),
            Sample::sized(2),
            Sample::sized(3),
        ));
        tx.send_replace(Some(Arc::clone(&report)));

        let received = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&received, &report));

        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), forwarder)
            .await
            .unwrap()
            .unwrap();
        broker.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_with_broker() {
        let broker = Arc::new(Broker::new(BrokerConfig::default()));
        broker.start().await.unwrap();

        let (tx, rx) = watch::channel(None);
        let forwarder = forward_reports(rx, Arc::clone(&broker));
        broker.stop().await.unwrap();

        tx.send_replace(Some(Arc::new(Report::new(
            Sample::sized(1),
            Sample::sized(1),
            Sample::sized(1),
        ))));

        tokio::time::timeout(Duration::from_secs(2), forwarder)
            .await
            .unwrap()
            .unwrap();
    }
}
