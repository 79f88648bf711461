use crate::debug_if_enabled;
use crate::error::Result;
use crate::mbox_error;
use crate::events::{
    EngineEvent, HookHandle, HookResponse, HotkeyBinding, HotkeyRegistration, InputCode,
    InputHookCallback, Modifiers, MouseEventKind, MouseHookEvent,
};
use crate::services::notifier::EventNotifier;
use crate::services::os_adapter::WindowAdapter;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LEFT_CTRL: u16 = 29;
const RIGHT_CTRL: u16 = 97;
const LEFT_SHIFT: u16 = 42;
const RIGHT_SHIFT: u16 = 54;
const LEFT_ALT: u16 = 56;
const RIGHT_ALT: u16 = 100;

#[derive(Default)]
struct BindingTables {
    keyboard: HashMap<i32, HotkeyBinding>,
    mouse: HashMap<i32, HotkeyBinding>,
}

/// Глобальные горячие клавиши: клавиатурные комбинации регистрируются в ОС,
/// кнопки мыши сопоставляются собственным перехватчиком.
///
/// Id живёт не более чем в одной таблице; повторная регистрация id
/// заменяет прежнюю привязку независимо от её типа.
pub struct HotkeyDispatcher {
    adapter: Arc<dyn WindowAdapter>,
    notifier: EventNotifier,
    tables: Arc<RwLock<BindingTables>>,
    hook: Mutex<Option<HookHandle>>,
}

impl HotkeyDispatcher {
    /// Создаёт диспетчер и устанавливает перехватчик мыши на всё время жизни
    pub fn new(adapter: Arc<dyn WindowAdapter>, notifier: EventNotifier) -> Result<Self> {
        let tables = Arc::new(RwLock::new(BindingTables::default()));
        let callback = Self::mouse_callback(
            Arc::downgrade(&tables),
            Arc::downgrade(&adapter),
            notifier.clone(),
        );
        let hook = adapter
            .install_input_hook(callback)
            .map_err(|e| mbox_error!(hook, "перехватчик горячих клавиш мыши: {}", e))?;

        info!("HotkeyDispatcher инициализирован (перехватчик {})", hook);
        Ok(Self {
            adapter,
            notifier,
            tables,
            hook: Mutex::new(Some(hook)),
        })
    }

    /// Зарегистрировать привязку. `false`, если ОС отказала
    /// или привязка мыши некорректна.
    pub fn register(&self, binding: HotkeyBinding) -> bool {
        let mut tables = self.tables.write();
        self.remove_locked(&mut tables, binding.id);

        if binding.is_mouse_binding() {
            if binding.modifiers.win {
                warn!("Привязка мыши {} не может использовать Win", binding);
                return false;
            }
            let taken = tables
                .mouse
                .values()
                .any(|b| b.code == binding.code && b.modifiers == binding.modifiers);
            if taken {
                warn!("Привязка мыши {} отклонена (комбинация занята)", binding);
                return false;
            }
            info!("Зарегистрирована привязка мыши {}", binding);
            tables.mouse.insert(binding.id, binding);
            return true;
        }

        let code = match binding.code {
            InputCode::Key(code) => code,
            InputCode::Mouse(button) => {
                warn!("Кнопка {} не может быть горячей клавишей ({})", button, binding);
                return false;
            }
        };

        let registration = HotkeyRegistration {
            modifiers: binding.modifiers,
            code,
            no_repeat: true,
        };
        if !self.adapter.register_global_hotkey(binding.id, registration) {
            warn!("ОС отклонила горячую клавишу {} (комбинация занята)", binding);
            return false;
        }

        info!("Зарегистрирована горячая клавиша {}", binding);
        tables.keyboard.insert(binding.id, binding);
        true
    }

    /// Неизвестный id игнорируется
    pub fn unregister(&self, id: i32) {
        let mut tables = self.tables.write();
        if self.remove_locked(&mut tables, id) {
            debug!("Привязка #{} снята", id);
        }
    }

    pub fn unregister_all(&self) {
        let mut tables = self.tables.write();
        for id in tables.keyboard.keys() {
            self.adapter.unregister_global_hotkey(*id);
        }
        let total = tables.keyboard.len() + tables.mouse.len();
        tables.keyboard.clear();
        tables.mouse.clear();
        info!("Сняты все привязки ({})", total);
    }

    /// Уведомление ОС о горячей клавише; `true`, если id известен
    pub fn process_message(&self, id: i32) -> bool {
        let binding = self.tables.read().keyboard.get(&id).cloned();
        match binding {
            Some(binding) => {
                debug_if_enabled!("Горячая клавиша {}", binding);
                self.notifier.publish(EngineEvent::HotkeyTriggered { id, binding });
                true
            }
            None => {
                debug!("Неизвестный id горячей клавиши: {}", id);
                false
            }
        }
    }

    /// Перекачка уведомлений ОС в `process_message` до закрытия канала или отмены
    pub async fn pump_messages(
        &self,
        mut messages: UnboundedReceiver<i32>,
        shutdown: CancellationToken,
    ) {
        info!("Обработка уведомлений о горячих клавишах запущена");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = messages.recv() => match message {
                    Some(id) => {
                        self.process_message(id);
                    }
                    None => break,
                },
            }
        }
        debug!("Обработка уведомлений о горячих клавишах остановлена");
    }

    /// Все активные привязки, отсортированные по id
    pub fn bindings(&self) -> Vec<HotkeyBinding> {
        let tables = self.tables.read();
        let mut all: Vec<HotkeyBinding> = tables
            .keyboard
            .values()
            .chain(tables.mouse.values())
            .cloned()
            .collect();
        all.sort_by_key(|b| b.id);
        all
    }

    /// Снять все привязки и перехватчик; повторный вызов ничего не делает
    pub fn dispose(&self) {
        let Some(hook) = self.hook.lock().take() else {
            return;
        };
        self.unregister_all();
        self.adapter.remove_input_hook(hook);
        info!("HotkeyDispatcher остановлен");
    }

    fn remove_locked(&self, tables: &mut BindingTables, id: i32) -> bool {
        if tables.keyboard.remove(&id).is_some() {
            self.adapter.unregister_global_hotkey(id);
            return true;
        }
        tables.mouse.remove(&id).is_some()
    }

    /// Колбэк выполняется на потоке ввода: без ожидания блокировок
    /// и без сильных ссылок на адаптер.
    fn mouse_callback(
        tables: Weak<RwLock<BindingTables>>,
        adapter: Weak<dyn WindowAdapter>,
        notifier: EventNotifier,
    ) -> InputHookCallback {
        Arc::new(move |event: &MouseHookEvent| {
            let MouseEventKind::ButtonDown(button) = event.kind else {
                return HookResponse::PassThrough;
            };
            let code = InputCode::Mouse(button);
            if !code.is_hook_button() {
                return HookResponse::PassThrough;
            }

            let (Some(tables), Some(adapter)) = (tables.upgrade(), adapter.upgrade()) else {
                return HookResponse::PassThrough;
            };
            let Some(tables) = tables.try_read() else {
                return HookResponse::PassThrough;
            };
            if tables.mouse.is_empty() {
                return HookResponse::PassThrough;
            }

            let down = |a: u16, b: u16| {
                adapter.is_key_physically_down(InputCode::Key(a))
                    || adapter.is_key_physically_down(InputCode::Key(b))
            };
            let modifiers = Modifiers {
                ctrl: down(LEFT_CTRL, RIGHT_CTRL),
                alt: down(LEFT_ALT, RIGHT_ALT),
                shift: down(LEFT_SHIFT, RIGHT_SHIFT),
                win: false,
            };

            let matched = tables
                .mouse
                .values()
                .find(|b| b.code == code && b.modifiers == modifiers)
                .cloned();
            drop(tables);

            match matched {
                Some(binding) => {
                    debug_if_enabled!("Привязка мыши {}", binding);
                    notifier.publish(EngineEvent::HotkeyTriggered { id: binding.id, binding });
                    HookResponse::Consume
                }
                None => HookResponse::PassThrough,
            }
        })
    }
}

impl Drop for HotkeyDispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HotkeyAction, MouseButton, ScreenPoint};
    use crate::services::os_adapter::{AdapterCall, DryRunAdapter};

    fn setup() -> (Arc<DryRunAdapter>, EventNotifier, HotkeyDispatcher) {
        let adapter = Arc::new(DryRunAdapter::new());
        let notifier = EventNotifier::new(16);
        let dispatcher = HotkeyDispatcher::new(adapter.clone(), notifier.clone()).unwrap();
        (adapter, notifier, dispatcher)
    }

    fn key_binding(id: i32, code: u16) -> HotkeyBinding {
        HotkeyBinding::new(id, Modifiers::new().with_ctrl(true), InputCode::Key(code), HotkeyAction::NextWindow)
    }

    fn mouse_binding(id: i32, button: MouseButton, modifiers: Modifiers) -> HotkeyBinding {
        HotkeyBinding::new(id, modifiers, InputCode::Mouse(button), HotkeyAction::PanicLeader)
    }

    fn unregister_count(adapter: &DryRunAdapter, id: i32) -> usize {
        adapter
            .calls()
            .iter()
            .filter(|c| **c == AdapterCall::UnregisterHotkey(id))
            .count()
    }

    #[test]
    fn test_keyboard_registration_sets_no_repeat() {
        let (adapter, _notifier, dispatcher) = setup();
        assert!(dispatcher.register(key_binding(1, 59)));

        let registered = adapter.registered_hotkeys();
        let registration = registered.get(&1).unwrap();
        assert!(registration.no_repeat);
        assert_eq!(registration.code, 59);
        assert!(registration.modifiers.ctrl);
    }

    #[test]
    fn test_registration_failure_is_reported() {
        let (adapter, _notifier, dispatcher) = setup();
        adapter.reserve_hotkey(Modifiers::new().with_ctrl(true), 59);

        assert!(!dispatcher.register(key_binding(1, 59)));
        assert!(dispatcher.bindings().is_empty());
        // Запасная комбинация
        assert!(dispatcher.register(key_binding(1, 60)));
    }

    #[test]
    fn test_reregistration_releases_previous_once() {
        let (adapter, _notifier, dispatcher) = setup();
        assert!(dispatcher.register(key_binding(5, 59)));
        assert!(dispatcher.register(key_binding(5, 60)));

        let bindings = dispatcher.bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].code, InputCode::Key(60));
        assert_eq!(unregister_count(&adapter, 5), 1);
    }

    #[test]
    fn test_reregistration_across_tables() {
        let (adapter, _notifier, dispatcher) = setup();
        assert!(dispatcher.register(key_binding(3, 59)));
        assert!(dispatcher.register(mouse_binding(3, MouseButton::X1, Modifiers::new())));

        let bindings = dispatcher.bindings();
        assert_eq!(bindings.len(), 1);
        assert!(bindings[0].is_mouse_binding());
        assert_eq!(unregister_count(&adapter, 3), 1);

        // Обратно на клавиатуру: из таблицы мыши ОС ничего не освобождает
        assert!(dispatcher.register(key_binding(3, 61)));
        assert_eq!(dispatcher.bindings().len(), 1);
        assert_eq!(unregister_count(&adapter, 3), 1);
    }

    #[test]
    fn test_invalid_mouse_bindings_rejected() {
        let (_adapter, _notifier, dispatcher) = setup();
        assert!(!dispatcher.register(mouse_binding(1, MouseButton::Left, Modifiers::new())));
        assert!(!dispatcher.register(mouse_binding(2, MouseButton::Right, Modifiers::new())));
        assert!(!dispatcher.register(mouse_binding(
            3,
            MouseButton::Middle,
            Modifiers::new().with_win(true)
        )));
        assert!(dispatcher.bindings().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_mouse_combination_rejected() {
        let (adapter, notifier, dispatcher) = setup();
        let mut events = notifier.subscribe();
        let shift = Modifiers::new().with_shift(true);

        assert!(dispatcher.register(mouse_binding(1, MouseButton::X1, Modifiers::new())));
        assert!(!dispatcher.register(mouse_binding(2, MouseButton::X1, Modifiers::new())));
        // Другие модификаторы и повторная регистрация того же id допустимы
        assert!(dispatcher.register(mouse_binding(3, MouseButton::X1, shift)));
        assert!(dispatcher.register(mouse_binding(1, MouseButton::X1, Modifiers::new())));

        let mut ids: Vec<i32> = dispatcher.bindings().iter().map(|b| b.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(
            adapter.simulate_user_click(MouseButton::X1, ScreenPoint::new(1, 1)),
            HookResponse::Consume
        );
        match events.recv().await.unwrap() {
            EngineEvent::HotkeyTriggered { id, .. } => assert_eq!(id, 1),
            other => panic!("неожиданное событие {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_process_message_raises_notification() {
        let (_adapter, notifier, dispatcher) = setup();
        let mut events = notifier.subscribe();
        dispatcher.register(key_binding(9, 59));

        assert!(dispatcher.process_message(9));
        assert!(!dispatcher.process_message(404));

        match events.recv().await.unwrap() {
            EngineEvent::HotkeyTriggered { id, binding } => {
                assert_eq!(id, 9);
                assert_eq!(binding.code, InputCode::Key(59));
            }
            other => panic!("неожиданное событие {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mouse_binding_matches_exact_modifiers() {
        let (adapter, notifier, dispatcher) = setup();
        let mut events = notifier.subscribe();
        dispatcher.register(mouse_binding(4, MouseButton::X2, Modifiers::new().with_shift(true)));

        let point = ScreenPoint::new(5, 5);
        // Без Shift: не совпадает, событие проходит дальше
        assert_eq!(
            adapter.simulate_user_click(MouseButton::X2, point),
            HookResponse::PassThrough
        );

        adapter.set_key_down(InputCode::Key(RIGHT_SHIFT), true);
        assert_eq!(
            adapter.simulate_user_click(MouseButton::X2, point),
            HookResponse::Consume
        );

        // Shift+Ctrl: лишний модификатор
        adapter.set_key_down(InputCode::Key(LEFT_CTRL), true);
        assert_eq!(
            adapter.simulate_user_click(MouseButton::X2, point),
            HookResponse::PassThrough
        );

        assert_eq!(
            events.recv().await.unwrap(),
            EngineEvent::HotkeyTriggered {
                id: 4,
                binding: mouse_binding(4, MouseButton::X2, Modifiers::new().with_shift(true)),
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pump_forwards_os_messages() {
        let (adapter, notifier, dispatcher) = setup();
        let mut events = notifier.subscribe();
        dispatcher.register(key_binding(2, 60));

        let messages = adapter.take_hotkey_messages().unwrap();
        assert!(adapter.simulate_hotkey(2));
        assert!(adapter.simulate_hotkey(2));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let pump = dispatcher.pump_messages(messages, shutdown);
        let check = async {
            for _ in 0..2 {
                assert!(matches!(
                    events.recv().await.unwrap(),
                    EngineEvent::HotkeyTriggered { id: 2, .. }
                ));
            }
            trigger.cancel();
        };
        tokio::join!(pump, check);
    }

    #[test]
    fn test_unregister_and_unknown_ids() {
        let (adapter, _notifier, dispatcher) = setup();
        dispatcher.register(key_binding(1, 59));
        dispatcher.register(mouse_binding(2, MouseButton::Middle, Modifiers::new()));

        dispatcher.unregister(2);
        dispatcher.unregister(77);
        assert_eq!(dispatcher.bindings().len(), 1);
        assert_eq!(
            adapter.simulate_user_click(MouseButton::Middle, ScreenPoint::default()),
            HookResponse::PassThrough
        );

        dispatcher.unregister_all();
        assert!(dispatcher.bindings().is_empty());
        assert!(adapter.registered_hotkeys().is_empty());
    }

    #[test]
    fn test_dispose_removes_hook() {
        let (adapter, _notifier, dispatcher) = setup();
        dispatcher.register(key_binding(1, 59));
        assert_eq!(adapter.hook_count(), 1);

        dispatcher.dispose();
        dispatcher.dispose();
        assert_eq!(adapter.hook_count(), 0);
        assert!(adapter.registered_hotkeys().is_empty());
        assert_eq!(unregister_count(&adapter, 1), 1);
    }
}
