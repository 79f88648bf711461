use crate::error::{MboxError, Result};
use crate::events::MouseButton;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Имя виртуального устройства: по нему читатели evdev узнают наш собственный ввод
pub const VIRTUAL_DEVICE_NAME: &str = "MBox-Rust Virtual Device";

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;

/// Виртуальное uinput устройство для аппаратной инъекции клавиш и кликов
pub struct VirtualDevice {
    device: Mutex<uinput::Device>,
    device_name: String,
}

impl VirtualDevice {
    pub fn new(device_name: &str) -> Result<Self> {
        info!("Создание виртуального устройства uinput '{}' для инъекции ввода", device_name);

        let device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .event(uinput::event::Controller::All)?
            .create()
            .map_err(|e| {
                MboxError::Internal(format!(
                    "Не удалось создать виртуальное устройство '{}': {}",
                    device_name, e
                ))
            })?;

        info!("Виртуальное устройство '{}' создано успешно", device_name);
        Ok(Self {
            device: Mutex::new(device),
            device_name: device_name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.device_name
    }

    /// Нажатие и отпускание кнопки мыши одним пакетом
    pub fn click(&self, button: MouseButton) -> Result<()> {
        let mut device = self.device.lock();
        let code = button.evdev_code();
        Self::write_key(&mut device, code, 1)?;
        Self::write_key(&mut device, code, 0)?;
        debug!("Виртуальный клик {}", button);
        Ok(())
    }

    fn write_key(device: &mut uinput::Device, code: u16, value: i32) -> Result<()> {
        device.write(EV_KEY, code as i32, value).map_err(|e| {
            MboxError::Internal(format!("Не удалось отправить событие клавиши {}: {}", code, e))
        })?;

        // Синхронизируем события
        device
            .write(EV_SYN, 0, 0)
            .map_err(|e| MboxError::Internal(format!("Не удалось синхронизировать события: {}", e)))
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        info!("Закрытие виртуального устройства '{}'", self.device_name);
    }
}
