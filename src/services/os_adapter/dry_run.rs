use crate::error::Result;
use crate::events::{
    ClientPoint, HookHandle, HookResponse, HotkeyRegistration, InputCode, InputHookCallback,
    Modifiers, MouseButton, MouseHookEvent, QueuedInput, ScreenPoint, SyntheticInput,
    WindowHandle, WindowRef,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::r#trait::WindowAdapter;

/// Записанный вызов примитива ОС
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    BringToFront(WindowHandle),
    Post(WindowHandle, QueuedInput),
    Synthetic(SyntheticInput),
    SetCursor(ScreenPoint),
    RegisterHotkey { id: i32, registration: HotkeyRegistration },
    UnregisterHotkey(i32),
    InstallHook(HookHandle),
    RemoveHook(HookHandle),
}

/// Как симулированное окно реагирует на попытку передать ему фокус
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusBehavior {
    Accept,
    /// Вызов ОС сообщает об ошибке
    Refuse,
    /// Вызов ОС сообщает об успехе, но фокус остаётся у прежнего окна
    Ignore,
}

#[derive(Debug, Clone)]
struct SimWindow {
    info: WindowRef,
    process_name: String,
    origin: ScreenPoint,
    valid: bool,
    focus: FocusBehavior,
    accepts_posts: bool,
}

/// Симулированный рабочий стол: режим сухого запуска и тесты
pub struct DryRunAdapter {
    windows: DashMap<WindowHandle, SimWindow>,
    order: RwLock<Vec<WindowHandle>>,
    foreground: Mutex<Option<WindowHandle>>,
    cursor: Mutex<ScreenPoint>,
    pressed: RwLock<HashSet<InputCode>>,
    hooks: Mutex<Vec<(HookHandle, InputHookCallback)>>,
    next_hook: AtomicU64,
    hotkeys: Mutex<HashMap<i32, HotkeyRegistration>>,
    reserved: Mutex<HashSet<(Modifiers, u16)>>,
    calls: Mutex<Vec<AdapterCall>>,
    hotkey_tx: UnboundedSender<i32>,
    hotkey_rx: Mutex<Option<UnboundedReceiver<i32>>>,
}

impl Default for DryRunAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunAdapter {
    pub fn new() -> Self {
        let (hotkey_tx, hotkey_rx) = unbounded_channel();
        Self {
            windows: DashMap::new(),
            order: RwLock::new(Vec::new()),
            foreground: Mutex::new(None),
            cursor: Mutex::new(ScreenPoint::default()),
            pressed: RwLock::new(HashSet::new()),
            hooks: Mutex::new(Vec::new()),
            next_hook: AtomicU64::new(1),
            hotkeys: Mutex::new(HashMap::new()),
            reserved: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            hotkey_tx,
            hotkey_rx: Mutex::new(Some(hotkey_rx)),
        }
    }

    /// Рабочий стол с четырьмя окнами целевого процесса для `--dry-run`
    pub fn with_demo_windows(process_name: &str) -> Self {
        let adapter = Self::new();
        let name = if process_name.is_empty() { "game" } else { process_name };
        for i in 0..4u64 {
            let window = WindowRef::new(
                WindowHandle(0x0400_0001 + i),
                4000 + i as u32,
                format!("{} - dry_run #{}", name, i + 1),
            );
            adapter.add_window(window, name, ScreenPoint::new(i as i32 * 640, 0));
        }
        info!("[DRY RUN] Симулированный рабочий стол: 4 окна процесса '{}'", name);
        adapter
    }

    pub fn add_window(&self, info: WindowRef, process_name: &str, origin: ScreenPoint) {
        let handle = info.handle;
        self.windows.insert(
            handle,
            SimWindow {
                info,
                process_name: process_name.to_string(),
                origin,
                valid: true,
                focus: FocusBehavior::Accept,
                accepts_posts: true,
            },
        );
        let mut order = self.order.write();
        if !order.contains(&handle) {
            order.push(handle);
        }
    }

    /// Окно закрыто: дескриптор становится недействительным
    #[allow(dead_code)]
    pub fn close_window(&self, handle: WindowHandle) {
        if let Some(mut window) = self.windows.get_mut(&handle) {
            window.valid = false;
        }
        self.order.write().retain(|h| *h != handle);
        let mut foreground = self.foreground.lock();
        if *foreground == Some(handle) {
            *foreground = None;
        }
    }

    #[allow(dead_code)]
    pub fn set_title(&self, handle: WindowHandle, title: &str) {
        if let Some(mut window) = self.windows.get_mut(&handle) {
            window.info.title = title.to_string();
        }
    }

    #[allow(dead_code)]
    pub fn set_focus_behavior(&self, handle: WindowHandle, behavior: FocusBehavior) {
        if let Some(mut window) = self.windows.get_mut(&handle) {
            window.focus = behavior;
        }
    }

    #[allow(dead_code)]
    pub fn set_accepts_posts(&self, handle: WindowHandle, accepts: bool) {
        if let Some(mut window) = self.windows.get_mut(&handle) {
            window.accepts_posts = accepts;
        }
    }

    #[allow(dead_code)]
    pub fn set_foreground(&self, handle: Option<WindowHandle>) {
        *self.foreground.lock() = handle;
    }

    #[allow(dead_code)]
    pub fn set_key_down(&self, code: InputCode, down: bool) {
        let mut pressed = self.pressed.write();
        if down {
            pressed.insert(code);
        } else {
            pressed.remove(&code);
        }
    }

    /// Комбинация, занятая "другим процессом"
    #[allow(dead_code)]
    pub fn reserve_hotkey(&self, modifiers: Modifiers, code: u16) {
        self.reserved.lock().insert((modifiers, code));
    }

    /// Доставить событие мыши всем установленным перехватчикам
    pub fn simulate_mouse(&self, event: MouseHookEvent) -> HookResponse {
        let callbacks: Vec<InputHookCallback> =
            self.hooks.lock().iter().map(|(_, cb)| cb.clone()).collect();

        let mut response = HookResponse::PassThrough;
        for callback in callbacks {
            if callback(&event) == HookResponse::Consume {
                response = HookResponse::Consume;
            }
        }
        response
    }

    /// Настоящий (не синтетический) клик пользователя
    #[allow(dead_code)]
    pub fn simulate_user_click(&self, button: MouseButton, point: ScreenPoint) -> HookResponse {
        *self.cursor.lock() = point;
        let response = self.simulate_mouse(MouseHookEvent::button_down(button, point, false));
        self.simulate_mouse(MouseHookEvent::button_up(button, point, false));
        response
    }

    /// ОС сообщает о срабатывании зарегистрированной горячей клавиши
    #[allow(dead_code)]
    pub fn simulate_hotkey(&self, id: i32) -> bool {
        self.hotkeys.lock().contains_key(&id) && self.hotkey_tx.send(id).is_ok()
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().clone()
    }

    #[allow(dead_code)]
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    #[allow(dead_code)]
    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    #[allow(dead_code)]
    pub fn registered_hotkeys(&self) -> HashMap<i32, HotkeyRegistration> {
        self.hotkeys.lock().clone()
    }

    fn record(&self, call: AdapterCall) {
        debug!("[DRY RUN] {:?}", call);
        self.calls.lock().push(call);
    }

    fn origin_of(&self, handle: WindowHandle) -> Option<ScreenPoint> {
        self.windows
            .get(&handle)
            .filter(|w| w.valid)
            .map(|w| w.origin)
    }
}

impl WindowAdapter for DryRunAdapter {
    fn enumerate_windows(&self) -> Vec<WindowRef> {
        self.order
            .read()
            .iter()
            .filter_map(|h| self.windows.get(h).filter(|w| w.valid).map(|w| w.info.clone()))
            .collect()
    }

    fn bring_to_front(&self, handle: WindowHandle) -> bool {
        self.record(AdapterCall::BringToFront(handle));

        let behavior = match self.windows.get(&handle) {
            Some(window) if window.valid => window.focus,
            _ => return false,
        };

        match behavior {
            FocusBehavior::Accept => {
                *self.foreground.lock() = Some(handle);
                info!("[DRY RUN] Фокус передан окну {}", handle);
                true
            }
            FocusBehavior::Refuse => false,
            FocusBehavior::Ignore => true,
        }
    }

    fn is_valid(&self, handle: WindowHandle) -> bool {
        self.windows.get(&handle).map(|w| w.valid).unwrap_or(false)
    }

    fn screen_to_client(&self, handle: WindowHandle, point: ScreenPoint) -> Option<ClientPoint> {
        let origin = self.origin_of(handle)?;
        Some(ClientPoint::new(point.x - origin.x, point.y - origin.y))
    }

    fn client_to_screen(&self, handle: WindowHandle, point: ClientPoint) -> Option<ScreenPoint> {
        let origin = self.origin_of(handle)?;
        Some(ScreenPoint::new(point.x + origin.x, point.y + origin.y))
    }

    fn post_queued_input(&self, handle: WindowHandle, input: QueuedInput) -> bool {
        self.record(AdapterCall::Post(handle, input));
        self.windows
            .get(&handle)
            .map(|w| w.valid && w.accepts_posts)
            .unwrap_or(false)
    }

    fn send_synthetic_input(&self, input: SyntheticInput) -> bool {
        self.record(AdapterCall::Synthetic(input));

        // Синтетический клик проходит через перехватчики, как и в настоящей ОС
        if let SyntheticInput::Click { button } = input {
            let point = *self.cursor.lock();
            self.simulate_mouse(MouseHookEvent::button_down(button, point, true));
            self.simulate_mouse(MouseHookEvent::button_up(button, point, true));
        }
        true
    }

    fn set_cursor_position(&self, point: ScreenPoint) {
        self.record(AdapterCall::SetCursor(point));
        *self.cursor.lock() = point;
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        Some(*self.cursor.lock())
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        *self.foreground.lock()
    }

    fn is_key_physically_down(&self, code: InputCode) -> bool {
        self.pressed.read().contains(&code)
    }

    fn register_global_hotkey(&self, id: i32, registration: HotkeyRegistration) -> bool {
        let combination = (registration.modifiers, registration.code);
        if self.reserved.lock().contains(&combination) {
            debug!("[DRY RUN] Комбинация {:?} занята другим процессом", combination);
            return false;
        }

        let mut hotkeys = self.hotkeys.lock();
        let taken = hotkeys.iter().any(|(other, r)| {
            *other != id && (r.modifiers, r.code) == combination
        });
        if taken {
            return false;
        }
        hotkeys.insert(id, registration);
        drop(hotkeys);

        self.record(AdapterCall::RegisterHotkey { id, registration });
        true
    }

    fn unregister_global_hotkey(&self, id: i32) {
        self.hotkeys.lock().remove(&id);
        self.record(AdapterCall::UnregisterHotkey(id));
    }

    fn install_input_hook(&self, callback: InputHookCallback) -> Result<HookHandle> {
        let handle = HookHandle(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().push((handle, callback));
        self.record(AdapterCall::InstallHook(handle));
        Ok(handle)
    }

    fn remove_input_hook(&self, handle: HookHandle) {
        self.hooks.lock().retain(|(h, _)| *h != handle);
        self.record(AdapterCall::RemoveHook(handle));
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.windows
            .iter()
            .find(|entry| entry.info.process_id == pid)
            .map(|entry| entry.process_name.clone())
    }

    fn take_hotkey_messages(&self) -> Option<UnboundedReceiver<i32>> {
        self.hotkey_rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn adapter_with(count: u64) -> DryRunAdapter {
        let adapter = DryRunAdapter::new();
        for i in 0..count {
            adapter.add_window(
                WindowRef::new(WindowHandle(i + 1), 10 + i as u32, format!("w{}", i)),
                "game",
                ScreenPoint::new(i as i32 * 100, 50),
            );
        }
        adapter
    }

    #[test]
    fn test_coordinate_conversion() {
        let adapter = adapter_with(2);
        let client = adapter
            .screen_to_client(WindowHandle(2), ScreenPoint::new(130, 70))
            .unwrap();
        assert_eq!(client, ClientPoint::new(30, 20));
        assert_eq!(
            adapter.client_to_screen(WindowHandle(1), client),
            Some(ScreenPoint::new(30, 70))
        );
        assert_eq!(adapter.screen_to_client(WindowHandle(9), ScreenPoint::default()), None);
    }

    #[test]
    fn test_closed_window_is_invalid() {
        let adapter = adapter_with(2);
        adapter.close_window(WindowHandle(1));

        assert!(!adapter.is_valid(WindowHandle(1)));
        assert!(!adapter.bring_to_front(WindowHandle(1)));
        assert_eq!(adapter.enumerate_windows().len(), 1);
    }

    #[test]
    fn test_focus_behaviors() {
        let adapter = adapter_with(3);
        assert!(adapter.bring_to_front(WindowHandle(1)));

        adapter.set_focus_behavior(WindowHandle(2), FocusBehavior::Refuse);
        assert!(!adapter.bring_to_front(WindowHandle(2)));

        adapter.set_focus_behavior(WindowHandle(3), FocusBehavior::Ignore);
        assert!(adapter.bring_to_front(WindowHandle(3)));
        assert_eq!(adapter.foreground_window(), Some(WindowHandle(1)));
    }

    #[test]
    fn test_synthetic_click_reaches_hooks_as_injected() {
        let adapter = adapter_with(1);
        let injected = Arc::new(AtomicUsize::new(0));
        let counter = injected.clone();
        adapter
            .install_input_hook(Arc::new(move |event: &MouseHookEvent| {
                if event.injected {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                HookResponse::PassThrough
            }))
            .unwrap();

        adapter.send_synthetic_input(SyntheticInput::Click { button: MouseButton::Left });

        // down + up
        assert_eq!(injected.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hotkey_registration_conflicts() {
        let adapter = adapter_with(0);
        let registration = HotkeyRegistration {
            modifiers: Modifiers::new().with_ctrl(true),
            code: 59,
            no_repeat: true,
        };

        assert!(adapter.register_global_hotkey(1, registration));
        assert!(!adapter.register_global_hotkey(2, registration));

        adapter.reserve_hotkey(Modifiers::new(), 60);
        assert!(!adapter.register_global_hotkey(3, HotkeyRegistration { modifiers: Modifiers::new(), code: 60, no_repeat: true }));

        assert!(adapter.simulate_hotkey(1));
        assert!(!adapter.simulate_hotkey(2));
        let mut rx = adapter.take_hotkey_messages().unwrap();
        assert_eq!(rx.try_recv().ok(), Some(1));
        assert!(adapter.take_hotkey_messages().is_none());
    }
}
