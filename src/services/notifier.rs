use crate::events::EngineEvent;
use crate::trace_if_enabled;
use tokio::sync::broadcast;

/// Шина событий движков: один издатель, любое число подписчиков.
/// Публикация не блокирует; медленный подписчик теряет старые события.
#[derive(Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        trace_if_enabled!("Публикация события: {}", event);
        // Отсутствие подписчиков не ошибка
        let _ = self.sender.send(event);
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
