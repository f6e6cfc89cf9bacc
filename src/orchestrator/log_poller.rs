use crate::gateway::RequestGateway;
use crate::model::OperationOutcome;
use crate::panel::LogRegion;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Refreshes the log region on a fixed interval.
///
/// Ticks never wait for earlier fetches, so fetches may resolve out of order; the
/// last one to resolve wins.
pub struct LogPoller {
    gateway: Arc<dyn RequestGateway>,
    region: LogRegion,
    interval: Duration,
}

impl LogPoller {
    pub fn new(gateway: Arc<dyn RequestGateway>, region: LogRegion, interval: Duration) -> Self {
        Self {
            gateway,
            region,
            interval,
        }
    }

    /// Start one fetch in the background.
    pub fn tick(&self) -> JoinHandle<()> {
        let gateway = self.gateway.clone();
        let region = self.region.clone();
        tokio::spawn(async move {
            match gateway.get_log().await {
                OperationOutcome::Success(snapshot) => region.replace(snapshot.text),
                // The next tick brings a fresh snapshot.
                OperationOutcome::Failure => trace!("log fetch failed"),
            }
        })
    }

    /// Tick forever. The first fetch happens one interval after start.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            drop(self.tick());
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ConfigMapping, ConfigValue, LogSnapshot, ProgramId, StateReport, UpdateReport,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Each `get_log` call takes the next pending answer from the queue.
    #[derive(Default)]
    struct QueuedLogGateway {
        answers: Mutex<VecDeque<oneshot::Receiver<OperationOutcome<LogSnapshot>>>>,
        calls: AtomicUsize,
    }

    impl QueuedLogGateway {
        fn push(&self) -> oneshot::Sender<OperationOutcome<LogSnapshot>> {
            let (tx, rx) = oneshot::channel();
            self.answers.lock().unwrap().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl RequestGateway for QueuedLogGateway {
        async fn execute(
            &self,
            _program: &ProgramId,
            _config: &ConfigMapping,
        ) -> OperationOutcome<StateReport> {
            OperationOutcome::Failure
        }

        async fn update_config(
            &self,
            _program: &ProgramId,
            _config: &ConfigMapping,
        ) -> OperationOutcome<UpdateReport> {
            OperationOutcome::Failure
        }

        async fn update_config_value(
            &self,
            _program: &ProgramId,
            _field: &str,
            _value: &ConfigValue,
        ) -> OperationOutcome<UpdateReport> {
            OperationOutcome::Failure
        }

        async fn get_log(&self) -> OperationOutcome<LogSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.answers.lock().unwrap().pop_front();
            match rx {
                Some(rx) => rx.await.unwrap_or(OperationOutcome::Failure),
                None => OperationOutcome::Failure,
            }
        }
    }

    fn snapshot(text: &str) -> OperationOutcome<LogSnapshot> {
        OperationOutcome::Success(LogSnapshot { text: text.into() })
    }

    #[tokio::test]
    async fn last_resolved_fetch_wins() {
        let gateway = Arc::new(QueuedLogGateway::default());
        let first = gateway.push();
        let second = gateway.push();
        let region = LogRegion::default();
        let poller = LogPoller::new(gateway.clone(), region.clone(), Duration::from_millis(1500));

        let tick1 = poller.tick();
        while gateway.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let tick2 = poller.tick();
        while gateway.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        second.send(snapshot("B")).unwrap();
        tick2.await.unwrap();
        assert_eq!(region.snapshot().text, "B");

        first.send(snapshot("A")).unwrap();
        tick1.await.unwrap();
        assert_eq!(region.snapshot().text, "A");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_content() {
        let gateway = Arc::new(QueuedLogGateway::default());
        let ok = gateway.push();
        let bad = gateway.push();
        let region = LogRegion::default();
        let poller = LogPoller::new(gateway, region.clone(), Duration::from_millis(1500));

        ok.send(snapshot("kept")).unwrap();
        poller.tick().await.unwrap();
        bad.send(OperationOutcome::Failure).unwrap();
        poller.tick().await.unwrap();
        assert_eq!(region.snapshot().text, "kept");
    }

    #[tokio::test(start_paused = true)]
    async fn run_fetches_once_per_interval() {
        let gateway = Arc::new(QueuedLogGateway::default());
        let poller = LogPoller::new(
            gateway.clone(),
            LogRegion::default(),
            Duration::from_millis(1500),
        );
        let handle = poller.spawn();

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        handle.abort();
    }
}
