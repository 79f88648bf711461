use crate::error::Result;
use crate::events::{WindowListEvent, WindowRef};
use crate::services::os_adapter::WindowAdapter;
use crate::services::service::BackgroundService;
use crate::debug_if_enabled;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Периодический опрос окон целевого процесса
pub struct WindowWatcher {
    adapter: Arc<dyn WindowAdapter>,
    process_name: String,
    polling_interval: Duration,
    sink: UnboundedSender<WindowListEvent>,
    shutdown: CancellationToken,
    previous: Vec<WindowRef>,
}

impl WindowWatcher {
    pub fn new(
        adapter: Arc<dyn WindowAdapter>,
        process_name: &str,
        polling_interval_ms: u64,
        sink: UnboundedSender<WindowListEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            adapter,
            process_name: process_name.to_lowercase(),
            polling_interval: Duration::from_millis(polling_interval_ms),
            sink,
            shutdown,
            previous: Vec::new(),
        }
    }

    /// Окна целевого процесса; пустое имя процесса оставляет все окна
    pub fn scan(&self) -> Vec<WindowRef> {
        self.adapter
            .enumerate_windows()
            .into_iter()
            .filter(|w| {
                self.process_name.is_empty()
                    || self
                        .adapter
                        .process_name(w.process_id)
                        .map(|name| name.to_lowercase() == self.process_name)
                        .unwrap_or(false)
            })
            .collect()
    }

    /// Один цикл опроса: событие, если изменился состав или состояние окон
    pub fn poll_once(&mut self) -> Option<WindowListEvent> {
        let current = self.scan();
        let changed = current.len() != self.previous.len()
            || current.iter().any(|w| {
                !self
                    .previous
                    .iter()
                    .any(|p| p.handle == w.handle && p.same_state(w))
            });

        if !changed {
            return None;
        }

        let event = WindowListEvent::diff(&self.previous, current);
        self.previous = event.current.clone();
        Some(event)
    }
}

#[async_trait::async_trait]
impl BackgroundService for WindowWatcher {
    fn name(&self) -> &'static str {
        "WindowWatcher"
    }

    async fn run(mut self: Box<Self>) -> Result<()> {
        info!(
            "WindowWatcher запущен: процесс '{}', интервал {:?}",
            self.process_name, self.polling_interval
        );

        let mut ticker = interval(self.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Some(event) = self.poll_once() {
                debug_if_enabled!("Изменение списка окон: {}", event);
                if self.sink.send(event).is_err() {
                    debug!("Получатель списка окон закрыт");
                    break;
                }
            }
        }

        info!("WindowWatcher остановлен");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ScreenPoint, WindowHandle};
    use crate::services::os_adapter::DryRunAdapter;
    use tokio::sync::mpsc::unbounded_channel;

    fn setup() -> (Arc<DryRunAdapter>, WindowWatcher) {
        let adapter = Arc::new(DryRunAdapter::new());
        adapter.add_window(WindowRef::new(WindowHandle(1), 10, "a"), "Game", ScreenPoint::default());
        adapter.add_window(WindowRef::new(WindowHandle(2), 20, "b"), "browser", ScreenPoint::default());
        adapter.add_window(WindowRef::new(WindowHandle(3), 30, "c"), "game", ScreenPoint::default());
        let (tx, _rx) = unbounded_channel();
        let watcher = WindowWatcher::new(adapter.clone(), "GAME", 250, tx, CancellationToken::new());
        (adapter, watcher)
    }

    #[test]
    fn test_scan_filters_by_process_name() {
        let (_adapter, watcher) = setup();
        let handles: Vec<u64> = watcher.scan().iter().map(|w| w.handle.value()).collect();
        assert_eq!(handles, vec![1, 3]);
    }

    #[test]
    fn test_empty_process_name_keeps_all() {
        let (adapter, _) = setup();
        let (tx, _rx) = unbounded_channel();
        let watcher = WindowWatcher::new(adapter, "", 250, tx, CancellationToken::new());
        assert_eq!(watcher.scan().len(), 3);
    }

    #[test]
    fn test_poll_reports_only_changes() {
        let (adapter, mut watcher) = setup();

        let first = watcher.poll_once().unwrap();
        assert_eq!(first.added.len(), 2);
        assert!(watcher.poll_once().is_none());

        adapter.set_title(WindowHandle(3), "renamed");
        let renamed = watcher.poll_once().unwrap();
        assert!(!renamed.has_membership_changes());
        assert_eq!(renamed.current[1].title, "renamed");

        adapter.close_window(WindowHandle(1));
        let closed = watcher.poll_once().unwrap();
        assert_eq!(closed.removed.len(), 1);
        assert_eq!(closed.current.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_events_until_cancelled() {
        let adapter = Arc::new(DryRunAdapter::with_demo_windows("game"));
        let (tx, mut rx) = unbounded_channel();
        let shutdown = CancellationToken::new();
        let watcher = WindowWatcher::new(adapter, "game", 100, tx, shutdown.clone());

        let handle = tokio::spawn(Box::new(watcher).run());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.current.len(), 4);

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}
