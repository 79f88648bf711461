use crate::error::{MboxError, Result};
use crate::services::os_adapter::VIRTUAL_DEVICE_NAME;
use evdev::KeyCode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Класс устройства ввода
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Keyboard,
    Mouse,
}

pub struct DeviceFinder;

impl DeviceFinder {
    /// Найти клавиатуры: указанный путь или все подходящие устройства
    pub fn find_keyboard_devices(device_path: &str) -> Result<Vec<PathBuf>> {
        Self::find_devices(device_path, DeviceClass::Keyboard)
    }

    /// Найти мыши; наше виртуальное устройство входит в список всегда,
    /// по нему читатель отличает синтетические клики
    pub fn find_mouse_devices(device_path: &str) -> Result<Vec<PathBuf>> {
        let mut devices = Self::find_devices(device_path, DeviceClass::Mouse)?;
        if device_path != "auto" {
            if let Some(virtual_device) = Self::find_virtual_device() {
                if !devices.contains(&virtual_device) {
                    devices.push(virtual_device);
                }
            }
        }
        Ok(devices)
    }

    fn find_devices(device_path: &str, class: DeviceClass) -> Result<Vec<PathBuf>> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            return if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                Ok(vec![path])
            } else {
                MboxError::device_not_found(format!("Указанное устройство не найдено: {:?}", path))
            };
        }

        info!("Начинаем автопоиск устройств ({:?})...", class);
        let devices: Vec<PathBuf> = Self::event_devices()?
            .into_iter()
            .filter(|path| Self::classify(path) == Some(class))
            .filter(|path| Self::is_device_accessible(path))
            .collect();

        if devices.is_empty() {
            return MboxError::device_not_found(format!(
                "Не найдено доступных устройств ({:?}). \
                 Убедитесь, что пользователь добавлен в группу 'input'",
                class
            ));
        }

        for device in &devices {
            info!("Найдено устройство {:?}: {:?}", class, device);
        }
        Ok(devices)
    }

    fn find_virtual_device() -> Option<PathBuf> {
        Self::event_devices().ok()?.into_iter().find(|path| {
            evdev::Device::open(path)
                .map(|d| d.name() == Some(VIRTUAL_DEVICE_NAME))
                .unwrap_or(false)
        })
    }

    fn event_devices() -> Result<Vec<PathBuf>> {
        let input_dir = Path::new("/dev/input");

        let entries = fs::read_dir(input_dir)
            .map_err(|e| MboxError::Permission(format!("Нет доступа к /dev/input: {}", e)))?;

        let mut event_devices = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with("event") {
                event_devices.push(path);
            }
        }

        // Сортируем устройства по номеру
        event_devices.sort();
        Ok(event_devices)
    }

    fn classify(device_path: &Path) -> Option<DeviceClass> {
        let device = match evdev::Device::open(device_path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", device_path, e);
                return None;
            }
        };

        let name = device.name().unwrap_or("Unknown").to_string();
        let keys = device.supported_keys()?;

        if name == VIRTUAL_DEVICE_NAME {
            return Some(DeviceClass::Mouse);
        }

        if keys.contains(KeyCode::BTN_LEFT) {
            debug!("Устройство {:?} ({}) подходит как мышь", device_path, name);
            return Some(DeviceClass::Mouse);
        }

        // У настоящей клавиатуры много клавиш
        let basic_keys = keys.contains(KeyCode::KEY_A)
            && keys.contains(KeyCode::KEY_SPACE)
            && keys.contains(KeyCode::KEY_ENTER);
        if basic_keys && keys.iter().count() > 20 {
            debug!("Устройство {:?} ({}) подходит как клавиатура", device_path, name);
            return Some(DeviceClass::Keyboard);
        }

        None
    }

    fn is_device_accessible(device_path: &Path) -> bool {
        match fs::File::open(device_path) {
            Ok(_) => true,
            Err(e) => {
                warn!("Устройство {:?} недоступно: {}", device_path, e);
                false
            }
        }
    }
}
