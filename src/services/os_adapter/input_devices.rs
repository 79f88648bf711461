use crate::error::{MboxError, Result};
use crate::events::{
    HookHandle, HookResponse, HotkeyRegistration, InputHookCallback, Modifiers, MouseButton,
    MouseHookEvent, ScreenPoint,
};
use crate::trace_if_enabled;
use evdev::{Device, EventType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::virtual_device::VIRTUAL_DEVICE_NAME;

const KEY_RELEASED: i32 = 0;
const KEY_PRESSED: i32 = 1;

/// Состояние физического ввода, собранное читателями evdev
///
/// Держит множество нажатых кодов, таблицу глобальных горячих клавиш
/// и список перехватчиков мыши.
pub struct InputTracker {
    pressed: RwLock<HashSet<u16>>,
    hotkeys: RwLock<HashMap<i32, HotkeyRegistration>>,
    hooks: RwLock<Vec<(HookHandle, InputHookCallback)>>,
    hotkey_tx: UnboundedSender<i32>,
    running: AtomicBool,
}

impl InputTracker {
    pub fn new(hotkey_tx: UnboundedSender<i32>) -> Self {
        Self {
            pressed: RwLock::new(HashSet::new()),
            hotkeys: RwLock::new(HashMap::new()),
            hooks: RwLock::new(Vec::new()),
            hotkey_tx,
            running: AtomicBool::new(true),
        }
    }

    pub fn is_down(&self, code: u16) -> bool {
        self.pressed.read().contains(&code)
    }

    /// Текущие модификаторы (левые и правые клавиши не различаются)
    pub fn modifiers(&self) -> Modifiers {
        let pressed = self.pressed.read();
        let any = |codes: [u16; 2]| codes.iter().any(|c| pressed.contains(c));
        Modifiers {
            ctrl: any([29, 97]),
            alt: any([56, 100]),
            shift: any([42, 54]),
            win: any([125, 126]),
        }
    }

    /// `false`, если та же комбинация уже занята другим id
    pub fn register(&self, id: i32, registration: HotkeyRegistration) -> bool {
        let mut hotkeys = self.hotkeys.write();
        let taken = hotkeys.iter().any(|(other, r)| {
            *other != id && r.modifiers == registration.modifiers && r.code == registration.code
        });
        if taken {
            return false;
        }
        hotkeys.insert(id, registration);
        true
    }

    pub fn unregister(&self, id: i32) {
        self.hotkeys.write().remove(&id);
    }

    pub fn add_hook(&self, handle: HookHandle, callback: InputHookCallback) {
        self.hooks.write().push((handle, callback));
    }

    pub fn remove_hook(&self, handle: HookHandle) {
        self.hooks.write().retain(|(h, _)| *h != handle);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Событие клавиши: обновляет нажатые коды и ищет совпадение горячей клавиши.
    /// Автоповтор (значение 2) не считается новым нажатием.
    pub fn handle_key(&self, code: u16, value: i32) {
        match value {
            KEY_PRESSED => {
                let modifiers = self.modifiers();
                self.pressed.write().insert(code);
                self.match_hotkeys(code, modifiers);
            }
            KEY_RELEASED => {
                self.pressed.write().remove(&code);
            }
            _ => {}
        }
    }

    fn match_hotkeys(&self, code: u16, modifiers: Modifiers) {
        let matched: Vec<i32> = self
            .hotkeys
            .read()
            .iter()
            .filter(|(_, r)| r.code == code && r.modifiers == modifiers)
            .map(|(id, _)| *id)
            .collect();

        for id in matched {
            debug!("Сработала глобальная горячая клавиша #{}", id);
            if self.hotkey_tx.send(id).is_err() {
                warn!("Получатель горячих клавиш закрыт, событие #{} потеряно", id);
            }
        }
    }

    /// Событие кнопки мыши: обновляет нажатые коды и отдаёт его перехватчикам.
    /// Колбэки копируются из-под блокировки, чтобы перехватчик мог снять сам себя.
    pub fn handle_button(
        &self,
        button: MouseButton,
        pressed: bool,
        point: ScreenPoint,
        injected: bool,
    ) -> HookResponse {
        if !injected {
            let mut codes = self.pressed.write();
            if pressed {
                codes.insert(button.evdev_code());
            } else {
                codes.remove(&button.evdev_code());
            }
        }

        let event = if pressed {
            MouseHookEvent::button_down(button, point, injected)
        } else {
            MouseHookEvent::button_up(button, point, injected)
        };

        let callbacks: Vec<InputHookCallback> =
            self.hooks.read().iter().map(|(_, cb)| cb.clone()).collect();

        let mut response = HookResponse::PassThrough;
        for callback in callbacks {
            if callback(&event) == HookResponse::Consume {
                response = HookResponse::Consume;
            }
        }
        response
    }
}

/// Запустить поток чтения одного evdev устройства.
/// Устройство не захватывается: события продолжают идти в оконную систему.
pub fn spawn_reader<F>(
    path: &Path,
    tracker: Arc<InputTracker>,
    cursor: F,
) -> Result<JoinHandle<()>>
where
    F: Fn() -> Option<ScreenPoint> + Send + 'static,
{
    let mut device = Device::open(path).map_err(|e| {
        MboxError::DeviceNotFound(format!("Не удалось открыть устройство {:?}: {}", path, e))
    })?;

    let name = device.name().unwrap_or("Unknown").to_string();
    let injected = name == VIRTUAL_DEVICE_NAME;
    let path: PathBuf = path.to_path_buf();
    info!("Чтение событий устройства {:?} ({})", path, name);

    let handle = std::thread::Builder::new()
        .name(format!("evdev-{}", name))
        .spawn(move || {
            while tracker.is_running() {
                let events: Vec<evdev::InputEvent> = match device.fetch_events() {
                    Ok(events) => events.collect(),
                    Err(e) => {
                        error!("Ошибка чтения событий {:?}: {}", path, e);
                        break;
                    }
                };

                for event in events {
                    if event.event_type() != EventType::KEY {
                        continue;
                    }
                    let code = event.code();
                    let value = event.value();

                    if let Some(button) = MouseButton::from_evdev_code(code) {
                        if value == 2 {
                            continue;
                        }
                        let point = cursor().unwrap_or_default();
                        let response =
                            tracker.handle_button(button, value == KEY_PRESSED, point, injected);
                        if response == HookResponse::Consume {
                            // Без эксклюзивного захвата событие уже ушло в X-сервер
                            trace_if_enabled!("Перехватчик поглотил {} (только учёт)", button);
                        }
                    } else if !injected {
                        tracker.handle_key(code, value);
                    }
                }
            }
            debug!("Поток чтения {:?} завершён", path);
        })?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::unbounded_channel;

    fn registration(modifiers: Modifiers, code: u16) -> HotkeyRegistration {
        HotkeyRegistration { modifiers, code, no_repeat: true }
    }

    #[test]
    fn test_hotkey_matches_exact_modifiers() {
        let (tx, mut rx) = unbounded_channel();
        let tracker = InputTracker::new(tx);
        assert!(tracker.register(7, registration(Modifiers::new().with_ctrl(true), 59)));

        // F1 без Ctrl
        tracker.handle_key(59, 1);
        tracker.handle_key(59, 0);
        assert!(rx.try_recv().is_err());

        // Ctrl+Shift+F1 не совпадает
        tracker.handle_key(29, 1);
        tracker.handle_key(42, 1);
        tracker.handle_key(59, 1);
        tracker.handle_key(59, 0);
        tracker.handle_key(42, 0);
        assert!(rx.try_recv().is_err());

        // Правый Ctrl + F1
        tracker.handle_key(29, 0);
        tracker.handle_key(97, 1);
        tracker.handle_key(59, 1);
        assert_eq!(rx.try_recv().ok(), Some(7));
    }

    #[test]
    fn test_autorepeat_does_not_retrigger() {
        let (tx, mut rx) = unbounded_channel();
        let tracker = InputTracker::new(tx);
        tracker.register(1, registration(Modifiers::new(), 60));

        tracker.handle_key(60, 1);
        tracker.handle_key(60, 2);
        tracker.handle_key(60, 2);
        assert_eq!(rx.try_recv().ok(), Some(1));
        assert!(rx.try_recv().is_err());
        assert!(tracker.is_down(60));

        tracker.handle_key(60, 0);
        assert!(!tracker.is_down(60));
    }

    #[test]
    fn test_register_rejects_taken_combination() {
        let (tx, _rx) = unbounded_channel();
        let tracker = InputTracker::new(tx);
        let combo = registration(Modifiers::new().with_alt(true), 30);

        assert!(tracker.register(1, combo));
        assert!(!tracker.register(2, combo));
        // Повторная регистрация того же id разрешена
        assert!(tracker.register(1, combo));

        tracker.unregister(1);
        assert!(tracker.register(2, combo));
    }

    #[test]
    fn test_button_reaches_hooks_and_tracks_state() {
        let (tx, _rx) = unbounded_channel();
        let tracker = InputTracker::new(tx);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        tracker.add_hook(
            HookHandle(1),
            Arc::new(move |event: &MouseHookEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
                if event.injected {
                    HookResponse::PassThrough
                } else {
                    HookResponse::Consume
                }
            }),
        );

        let point = ScreenPoint::new(10, 20);
        assert_eq!(
            tracker.handle_button(MouseButton::X1, true, point, false),
            HookResponse::Consume
        );
        assert!(tracker.is_down(MouseButton::X1.evdev_code()));

        // Синтетическая кнопка не меняет физическое состояние
        assert_eq!(
            tracker.handle_button(MouseButton::Left, true, point, true),
            HookResponse::PassThrough
        );
        assert!(!tracker.is_down(MouseButton::Left.evdev_code()));

        tracker.remove_hook(HookHandle(1));
        tracker.handle_button(MouseButton::X1, false, point, false);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!tracker.is_down(MouseButton::X1.evdev_code()));
    }
}
