//! Polling update coordinator.
//!
//! A coordinator owns one data source, invokes it on a fixed interval (or on
//! demand), keeps the last fetched value and broadcasts every change to its
//! observers through a `watch` channel. Retry policy is the interval itself:
//! a failed update is simply tried again on the next tick, except for
//! authentication failures, which stop polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::warn;

/// Failure signals a data source can raise to its coordinator.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Credentials are invalid or expired. Fatal until the user re-authenticates.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Transient failure; the previous data is kept and polling continues.
    #[error("{0}")]
    UpdateFailed(String),

    /// Anything the data source did not translate.
    #[error("unexpected error: {0}")]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),
}

/// A source of data polled by a [`Coordinator`].
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    /// Fetch a complete, fresh value.
    async fn fetch(&self) -> Result<Self::Data, UpdateError>;
}

/// What observers see: the last good value plus the outcome of the last update.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub data: Option<Arc<T>>,
    pub last_update_success: bool,
    pub auth_failed: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_update_success: false,
            auth_failed: false,
        }
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update_success: self.last_update_success,
            auth_failed: self.auth_failed,
        }
    }
}

pub struct Coordinator<S: DataSource> {
    name: String,
    source: S,
    update_interval: Duration,
    tx: watch::Sender<Snapshot<S::Data>>,
}

impl<S: DataSource> Coordinator<S> {
    pub fn new(name: impl Into<String>, source: S, update_interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self {
            name: name.into(),
            source,
            update_interval,
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Last successfully fetched value, if any.
    pub fn data(&self) -> Option<Arc<S::Data>> {
        self.tx.borrow().data.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.tx.borrow().last_update_success
    }

    pub fn snapshot(&self) -> Snapshot<S::Data> {
        self.tx.borrow().clone()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S::Data>> {
        self.tx.subscribe()
    }

    /// Fetch once and publish the outcome.
    ///
    /// On success the cached value is replaced wholesale. On failure the
    /// cached value is kept and `last_update_success` is cleared. Observers
    /// are notified either way.
    pub async fn refresh(&self) -> Result<(), UpdateError> {
        match self.source.fetch().await {
            Ok(data) => {
                debug!("[{}] Fetched new data", self.name);
                self.tx.send_modify(|snapshot| {
                    snapshot.data = Some(Arc::new(data));
                    snapshot.last_update_success = true;
                });
                Ok(())
            }
            Err(e) => {
                let auth_failed = matches!(e, UpdateError::AuthFailed(_));
                self.tx.send_modify(|snapshot| {
                    snapshot.last_update_success = false;
                    snapshot.auth_failed |= auth_failed;
                });
                Err(e)
            }
        }
    }

    /// Poll on the update interval until the data source reports an
    /// authentication failure, which is returned.
    ///
    /// The first tick is skipped: callers are expected to have done the first
    /// refresh themselves during setup.
    pub async fn run(&self) -> UpdateError {
        let mut ticker = tokio::time::interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.refresh().await {
                Ok(()) => {}
                Err(e @ UpdateError::AuthFailed(_)) => {
                    error!("[{}] {}; polling stopped", self.name, e);
                    return e;
                }
                Err(e @ UpdateError::UpdateFailed(_)) => {
                    warn!("[{}] Update failed: {}", self.name, e);
                }
                Err(e) => {
                    error!("[{}] Error fetching data: {}", self.name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Hands out queued results, then keeps failing
    struct ScriptedSource {
        results: Mutex<VecDeque<Result<u32, UpdateError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<u32, UpdateError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        type Data = u32;

        async fn fetch(&self) -> Result<u32, UpdateError> {
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UpdateError::UpdateFailed("exhausted".to_string())))
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_data() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![Ok(1), Ok(2)]),
            Duration::from_secs(30),
        );
        assert!(coordinator.data().is_none());

        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.data().as_deref(), Some(&1));

        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.data().as_deref(), Some(&2));
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_update_failure_keeps_previous_data() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![
                Ok(7),
                Err(UpdateError::UpdateFailed("cloud down".to_string())),
            ]),
            Duration::from_secs(30),
        );

        coordinator.refresh().await.unwrap();
        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, UpdateError::UpdateFailed(_)));
        assert_eq!(coordinator.data().as_deref(), Some(&7));
        assert!(!coordinator.last_update_success());
        assert!(!coordinator.snapshot().auth_failed);
    }

    #[tokio::test]
    async fn test_observers_are_notified_of_failures() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![
                Ok(1),
                Err(UpdateError::UpdateFailed("timeout".to_string())),
            ]),
            Duration::from_secs(30),
        );
        let mut rx = coordinator.subscribe();

        coordinator.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().last_update_success);

        coordinator.refresh().await.unwrap_err();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().last_update_success);
    }

    #[tokio::test]
    async fn test_run_stops_on_auth_failure() {
        let coordinator = Coordinator::new(
            "test",
            ScriptedSource::new(vec![
                Err(UpdateError::UpdateFailed("flaky".to_string())),
                Ok(3),
                Err(UpdateError::AuthFailed("token expired".to_string())),
                Ok(4),
            ]),
            Duration::from_millis(1),
        );

        let err = coordinator.run().await;

        assert!(matches!(err, UpdateError::AuthFailed(_)));
        assert_eq!(*coordinator.source.calls.lock().unwrap(), 3);
        assert_eq!(coordinator.data().as_deref(), Some(&3));
        assert!(coordinator.snapshot().auth_failed);
    }
}
