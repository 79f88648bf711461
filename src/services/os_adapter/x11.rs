use crate::config::Config;
use crate::error::Result;
use crate::mbox_error;
use crate::events::{
    ClientPoint, HookHandle, HotkeyRegistration, InputCode, InputHookCallback, QueuedInput,
    ScreenPoint, SyntheticInput, WindowHandle, WindowRef,
};
use crate::mappings::KeyNames;
use crate::utils::DeviceFinder;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};

use super::input_devices::{spawn_reader, InputTracker};
use super::r#trait::WindowAdapter;
use super::virtual_device::{VirtualDevice, VIRTUAL_DEVICE_NAME};
use super::wmctrl::Wmctrl;
use super::xdotool::Xdotool;

/// Адаптер X11: окна через wmctrl/xdotool, физический ввод через evdev,
/// синтетический ввод через uinput
pub struct X11Adapter {
    xdotool: Xdotool,
    wmctrl: Wmctrl,
    virtual_device: VirtualDevice,
    tracker: Arc<InputTracker>,
    hotkey_rx: Mutex<Option<UnboundedReceiver<i32>>>,
    next_hook: AtomicU64,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl X11Adapter {
    pub fn new(config: &Config) -> Result<Self> {
        info!("Инициализация X11Adapter");

        let xdotool = Xdotool::new();
        xdotool.test()?;
        let wmctrl = Wmctrl::new();
        wmctrl.test()?;

        let virtual_device = VirtualDevice::new(VIRTUAL_DEVICE_NAME)?;
        // udev создаёт узел /dev/input/eventN не сразу
        std::thread::sleep(Duration::from_millis(200));

        let (hotkey_tx, hotkey_rx) = unbounded_channel();
        let tracker = Arc::new(InputTracker::new(hotkey_tx));

        let mut readers = Vec::new();
        let keyboards = DeviceFinder::find_keyboard_devices(&config.input.keyboard_device)?;
        let mice = match DeviceFinder::find_mouse_devices(&config.input.mouse_device) {
            Ok(mice) => mice,
            Err(e) => {
                warn!("Мышь не найдена, перехватчики мыши работать не будут: {}", e);
                Vec::new()
            }
        };

        for path in keyboards.iter().chain(mice.iter()) {
            let cursor_source = Xdotool::new();
            match spawn_reader(path, tracker.clone(), move || cursor_source.mouse_location()) {
                Ok(handle) => readers.push(handle),
                Err(e) => warn!("Не удалось запустить чтение {:?}: {}", path, e),
            }
        }

        if readers.is_empty() {
            return Err(mbox_error!(
                device_not_found,
                "Не удалось открыть ни одного устройства ввода"
            ));
        }

        info!(
            "X11Adapter готов: читателей устройств {}, виртуальное устройство '{}'",
            readers.len(),
            virtual_device.name()
        );
        Ok(Self {
            xdotool,
            wmctrl,
            virtual_device,
            tracker,
            hotkey_rx: Mutex::new(Some(hotkey_rx)),
            next_hook: AtomicU64::new(1),
            readers: Mutex::new(readers),
        })
    }

    fn post_key(&self, handle: WindowHandle, code: u16, pressed: bool) -> bool {
        match KeyNames::keysym(code) {
            Some(keysym) => self.xdotool.key_to_window(handle, keysym, pressed),
            None => {
                debug!("Нет keysym для KEY_{}", code);
                false
            }
        }
    }
}

impl WindowAdapter for X11Adapter {
    fn enumerate_windows(&self) -> Vec<WindowRef> {
        self.wmctrl.list_windows().unwrap_or_else(|e| {
            warn!("Не удалось получить список окон: {}", e);
            Vec::new()
        })
    }

    fn bring_to_front(&self, handle: WindowHandle) -> bool {
        self.xdotool.activate(handle)
    }

    fn is_valid(&self, handle: WindowHandle) -> bool {
        self.xdotool.window_exists(handle)
    }

    fn screen_to_client(&self, handle: WindowHandle, point: ScreenPoint) -> Option<ClientPoint> {
        let geometry = self.xdotool.geometry(handle)?;
        Some(ClientPoint::new(point.x - geometry.x, point.y - geometry.y))
    }

    fn client_to_screen(&self, handle: WindowHandle, point: ClientPoint) -> Option<ScreenPoint> {
        let geometry = self.xdotool.geometry(handle)?;
        Some(ScreenPoint::new(point.x + geometry.x, point.y + geometry.y))
    }

    fn post_queued_input(&self, handle: WindowHandle, input: QueuedInput) -> bool {
        match input {
            QueuedInput::KeyDown { code } => self.post_key(handle, code, true),
            QueuedInput::KeyUp { code } => self.post_key(handle, code, false),
            QueuedInput::ButtonDown { button, point } => {
                self.xdotool.button_to_window(handle, button, point, true)
            }
            QueuedInput::ButtonUp { button, point } => {
                self.xdotool.button_to_window(handle, button, point, false)
            }
        }
    }

    fn send_synthetic_input(&self, input: SyntheticInput) -> bool {
        let result = match input {
            SyntheticInput::Click { button } => self.virtual_device.click(button),
        };
        result
            .map_err(|e| warn!("Синтетический ввод не доставлен: {}", e))
            .is_ok()
    }

    fn set_cursor_position(&self, point: ScreenPoint) {
        if !self.xdotool.mouse_move(point) {
            debug!("Не удалось переместить курсор в {}", point);
        }
    }

    fn cursor_position(&self) -> Option<ScreenPoint> {
        self.xdotool.mouse_location()
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        self.xdotool.active_window()
    }

    fn is_key_physically_down(&self, code: InputCode) -> bool {
        self.tracker.is_down(code.evdev_code())
    }

    fn register_global_hotkey(&self, id: i32, registration: HotkeyRegistration) -> bool {
        self.tracker.register(id, registration)
    }

    fn unregister_global_hotkey(&self, id: i32) {
        self.tracker.unregister(id);
    }

    fn install_input_hook(&self, callback: InputHookCallback) -> Result<HookHandle> {
        let handle = HookHandle(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.tracker.add_hook(handle, callback);
        debug!("Перехватчик мыши {} установлен", handle);
        Ok(handle)
    }

    fn remove_input_hook(&self, handle: HookHandle) {
        self.tracker.remove_hook(handle);
        debug!("Перехватчик мыши {} снят", handle);
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        std::fs::read_to_string(format!("/proc/{}/comm", pid))
            .ok()
            .map(|name| name.trim().to_string())
    }

    fn take_hotkey_messages(&self) -> Option<UnboundedReceiver<i32>> {
        self.hotkey_rx.lock().take()
    }
}

impl Drop for X11Adapter {
    fn drop(&mut self) {
        self.tracker.stop();
        // Потоки блокируются в чтении и завершатся на следующем событии
        let readers = std::mem::take(&mut *self.readers.lock());
        info!("Остановка X11Adapter, читателей: {}", readers.len());
    }
}
