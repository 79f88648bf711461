use crate::error::{ErrorKind, Result};
use crate::events::{
    BroadcastPreset, EngineEvent, HotkeyAction, HotkeyBinding, InputCode, WindowListEvent,
};
use crate::services::broadcaster::Broadcaster;
use crate::services::focus_navigator::FocusNavigator;
use crate::services::os_adapter::WindowAdapter;
use crate::services::push_broadcaster::PushBroadcaster;
use crate::services::service::BackgroundService;
use crate::debug_if_enabled;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Движки, общие для маршрутизатора и `main`
#[derive(Clone)]
pub struct Engines {
    pub adapter: Arc<dyn WindowAdapter>,
    pub navigator: Arc<FocusNavigator>,
    pub broadcaster: Arc<Broadcaster>,
    pub push: Arc<PushBroadcaster>,
}

/// Превращает сработавшие горячие клавиши в действия движков,
/// ведёт список слотов и управляет push-to-broadcast по клавише-триггеру.
pub struct ActionRouter {
    engines: Engines,
    presets: HashMap<String, BroadcastPreset>,
    events: broadcast::Receiver<EngineEvent>,
    windows: UnboundedReceiver<WindowListEvent>,
    shutdown: CancellationToken,
    trigger: Option<InputCode>,
    trigger_poll: Duration,
    trigger_down: bool,
}

impl ActionRouter {
    pub fn new(
        engines: Engines,
        presets: &[BroadcastPreset],
        events: broadcast::Receiver<EngineEvent>,
        windows: UnboundedReceiver<WindowListEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engines,
            presets: presets
                .iter()
                .map(|p| (p.name.to_lowercase(), p.clone()))
                .collect(),
            events,
            windows,
            shutdown,
            trigger: None,
            trigger_poll: Duration::from_millis(25),
            trigger_down: false,
        }
    }

    pub fn with_push_trigger(mut self, trigger: Option<InputCode>, poll_ms: u64) -> Self {
        self.trigger = trigger;
        self.trigger_poll = Duration::from_millis(poll_ms.max(1));
        self
    }

    /// Выполнить действие привязки.
    /// Для рассылки возвращается задача, отменяемая при завершении работы.
    pub fn route(&self, binding: &HotkeyBinding) -> Option<JoinHandle<()>> {
        let navigator = &self.engines.navigator;
        let result = match binding.action {
            HotkeyAction::FocusSlot => match binding.slot_index {
                Some(index) => navigator.focus_slot(index),
                None => {
                    warn!("Привязка {} без номера слота", binding);
                    return None;
                }
            },
            HotkeyAction::NextWindow => navigator.focus_next(),
            HotkeyAction::PreviousWindow => navigator.focus_previous(),
            HotkeyAction::LastWindow => navigator.focus_last(),
            HotkeyAction::PanicLeader => navigator.focus_leader(),
            HotkeyAction::Broadcast => return self.spawn_broadcast(binding),
            HotkeyAction::PasteToChat => {
                warn!("Действие PasteToChat для {} не поддерживается", binding);
                return None;
            }
        };

        match result {
            Ok(()) => {
                debug_if_enabled!("{} выполнено", binding);
            }
            Err(e) if e.kind() == ErrorKind::TransientOs => warn!("{}: {}", binding, e),
            Err(e) => debug!("{}: {}", binding, e),
        }
        None
    }

    fn spawn_broadcast(&self, binding: &HotkeyBinding) -> Option<JoinHandle<()>> {
        let Some(name) = binding.preset.as_deref() else {
            warn!("Привязка {} без имени пресета", binding);
            return None;
        };
        let Some(preset) = self.presets.get(&name.to_lowercase()).cloned() else {
            warn!("Пресет '{}' не найден", name);
            return None;
        };

        let windows = self.engines.navigator.slots();
        let leader = self.engines.navigator.current_leader().map(|w| w.handle);
        let broadcaster = self.engines.broadcaster.clone();
        let cancel = self.shutdown.child_token();

        Some(tokio::spawn(async move {
            match broadcaster
                .execute_broadcast(&preset, &windows, leader, &cancel)
                .await
            {
                Ok(report) if !report.is_complete() => warn!("Рассылка неполная: {}", report),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Gated || e.kind() == ErrorKind::Cancelled => {
                    debug!("Рассылка '{}' не выполнена: {}", preset.name, e)
                }
                Err(e) => warn!("Рассылка '{}' не выполнена: {}", preset.name, e),
            }
        }))
    }

    pub fn handle_window_list(&self, event: &WindowListEvent) {
        let delta = self.engines.navigator.merge_slots(&event.current);
        if delta.has_membership_changes() {
            info!(
                "Слоты обновлены: +{} -{}, всего {}",
                delta.added.len(),
                delta.removed.len(),
                delta.current.len()
            );
        }
    }

    /// Один опрос клавиши-триггера: нажатие включает режим, отпускание выключает
    pub fn poll_trigger(&mut self) {
        let Some(trigger) = self.trigger else {
            return;
        };
        let down = self.engines.adapter.is_key_physically_down(trigger);
        if down == self.trigger_down {
            return;
        }
        self.trigger_down = down;

        if down {
            if let Err(e) = self.engines.push.arm(self.engines.navigator.slots()) {
                warn!("Не удалось включить push-to-broadcast: {}", e);
            }
        } else {
            self.engines.push.disarm();
        }
    }
}

#[async_trait::async_trait]
impl BackgroundService for ActionRouter {
    fn name(&self) -> &'static str {
        "ActionRouter"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        info!("ActionRouter запущен: {} пресетов", this.presets.len());

        let mut ticker = interval(this.trigger_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let polling = this.trigger.is_some();
        let mut windows_open = true;

        loop {
            tokio::select! {
                _ = this.shutdown.cancelled() => break,
                event = this.events.recv() => match event {
                    Ok(EngineEvent::HotkeyTriggered { binding, .. }) => {
                        this.route(&binding);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!("ActionRouter пропустил {} событий", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
                list = this.windows.recv(), if windows_open => match list {
                    Some(list) => this.handle_window_list(&list),
                    None => windows_open = false,
                },
                _ = ticker.tick(), if polling => this.poll_trigger(),
            }
        }

        this.engines.push.disarm();
        info!("ActionRouter остановлен");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Modifiers, QueuedInput, ScreenPoint, WindowHandle, WindowRef};
    use crate::services::notifier::EventNotifier;
    use crate::services::os_adapter::{AdapterCall, DryRunAdapter};
    use crate::services::push_broadcaster::PushTiming;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

    const CAPSLOCK: InputCode = InputCode::Key(58);

    struct Fixture {
        adapter: Arc<DryRunAdapter>,
        engines: Engines,
        notifier: EventNotifier,
        windows_tx: UnboundedSender<WindowListEvent>,
        shutdown: CancellationToken,
        router: ActionRouter,
    }

    fn window(id: u64) -> WindowRef {
        WindowRef::new(WindowHandle(id), id as u32, format!("w{}", id))
    }

    fn setup(count: u64) -> Fixture {
        let adapter = Arc::new(DryRunAdapter::new());
        for id in 1..=count {
            adapter.add_window(window(id), "game", ScreenPoint::new(id as i32 * 1000, 0));
        }
        let notifier = EventNotifier::default();
        let engines = Engines {
            adapter: adapter.clone(),
            navigator: Arc::new(FocusNavigator::new(adapter.clone())),
            broadcaster: Arc::new(Broadcaster::new(adapter.clone(), 0)),
            push: Arc::new(PushBroadcaster::new(
                adapter.clone(),
                notifier.clone(),
                PushTiming::default(),
            )),
        };
        engines.navigator.update_slots(adapter.enumerate_windows());

        let presets = vec![BroadcastPreset::key("Jump", "space").with_targets("all_except_leader")];
        let (windows_tx, windows_rx) = unbounded_channel();
        let shutdown = CancellationToken::new();
        let router = ActionRouter::new(
            engines.clone(),
            &presets,
            notifier.subscribe(),
            windows_rx,
            shutdown.clone(),
        )
        .with_push_trigger(Some(CAPSLOCK), 10);

        Fixture { adapter, engines, notifier, windows_tx, shutdown, router }
    }

    fn binding(id: i32, action: HotkeyAction) -> HotkeyBinding {
        HotkeyBinding::new(id, Modifiers::new().with_ctrl(true), InputCode::Key(59 + id as u16), action)
    }

    #[test]
    fn test_focus_actions_reach_navigator() {
        let f = setup(3);

        f.router.route(&binding(1, HotkeyAction::FocusSlot).with_slot(2));
        assert_eq!(f.engines.navigator.current_slot_index(), Some(2));

        f.router.route(&binding(2, HotkeyAction::NextWindow));
        assert_eq!(f.engines.navigator.current_slot_index(), Some(0));

        f.router.route(&binding(3, HotkeyAction::LastWindow));
        assert_eq!(f.engines.navigator.current_slot_index(), Some(2));

        f.router.route(&binding(4, HotkeyAction::PanicLeader));
        assert_eq!(f.engines.navigator.current_slot_index(), Some(0));
        assert_eq!(f.adapter.foreground_window(), Some(WindowHandle(1)));
    }

    #[test]
    fn test_unroutable_bindings_do_nothing() {
        let f = setup(2);
        f.adapter.clear_calls();

        assert!(f.router.route(&binding(1, HotkeyAction::FocusSlot)).is_none());
        assert!(f.router.route(&binding(2, HotkeyAction::PasteToChat)).is_none());
        assert!(f.router.route(&binding(3, HotkeyAction::Broadcast)).is_none());
        assert!(f
            .router
            .route(&binding(4, HotkeyAction::Broadcast).with_preset("missing"))
            .is_none());
        assert!(f.adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_skips_leader() {
        let f = setup(3);
        f.adapter.clear_calls();

        let task = f
            .router
            .route(&binding(1, HotkeyAction::Broadcast).with_preset("JUMP"))
            .unwrap();
        task.await.unwrap();

        let targets: Vec<WindowHandle> = f
            .adapter
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                AdapterCall::Post(h, QueuedInput::KeyDown { .. }) => Some(h),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![WindowHandle(2), WindowHandle(3)]);
    }

    #[test]
    fn test_window_list_is_merged() {
        let f = setup(2);
        f.adapter.add_window(window(7), "game", ScreenPoint::default());

        let event = WindowListEvent::diff(&[], f.adapter.enumerate_windows());
        f.router.handle_window_list(&event);

        let handles: Vec<u64> = f.engines.navigator.slots().iter().map(|w| w.handle.value()).collect();
        assert_eq!(handles, vec![1, 2, 7]);
    }

    #[tokio::test]
    async fn test_trigger_arms_and_disarms() {
        let mut f = setup(3);

        f.router.poll_trigger();
        assert!(!f.engines.push.is_armed());

        f.adapter.set_key_down(CAPSLOCK, true);
        f.router.poll_trigger();
        assert!(f.engines.push.is_armed());
        assert_eq!(f.engines.push.pool().len(), 3);

        f.router.poll_trigger();
        assert!(f.engines.push.is_armed());

        f.adapter.set_key_down(CAPSLOCK, false);
        f.router.poll_trigger();
        assert!(!f.engines.push.is_armed());
        assert_eq!(f.adapter.hook_count(), 0);
    }

    #[test]
    fn test_trigger_with_empty_pool_stays_disarmed() {
        let mut f = setup(0);
        f.adapter.set_key_down(CAPSLOCK, true);
        f.router.poll_trigger();
        assert!(!f.engines.push.is_armed());
    }

    #[tokio::test]
    async fn test_run_routes_events_until_shutdown() {
        let f = setup(3);
        let Fixture { adapter, engines, notifier, windows_tx, shutdown, router } = f;

        let task = tokio::spawn(Box::new(router).run());

        adapter.add_window(window(9), "game", ScreenPoint::default());
        windows_tx
            .send(WindowListEvent::diff(&[], adapter.enumerate_windows()))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while engines.navigator.slots().len() != 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        notifier.publish(EngineEvent::HotkeyTriggered {
            id: 1,
            binding: binding(1, HotkeyAction::FocusSlot).with_slot(3),
        });

        adapter.set_key_down(CAPSLOCK, true);
        tokio::time::timeout(Duration::from_secs(2), async {
            while engines.navigator.current_slot_index() != Some(3) || !engines.push.is_armed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(adapter.foreground_window(), Some(WindowHandle(9)));

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
        assert!(!engines.push.is_armed());
    }
}
