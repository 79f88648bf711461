use crate::error::Result;
use crate::mbox_error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

const INPUT_DIR: &str = "/dev/input";
const UINPUT_DEVICE: &str = "/dev/uinput";

/// Проверить доступ к устройствам ввода и uinput перед запуском перехватчиков
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access(Path::new(INPUT_DIR))?;
    check_uinput_access(Path::new(UINPUT_DEVICE))?;
    check_display();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(mbox_error!(
            permission,
            "Директория {} не существует",
            input_dir.display()
        ));
    }

    fs::read_dir(input_dir).map_err(|e| {
        mbox_error!(
            permission,
            "Нет доступа к {}: {}. Добавьте пользователя в группу 'input'",
            input_dir.display(),
            e
        )
    })?;

    info!("Доступ к {} подтвержден", input_dir.display());
    Ok(())
}

fn check_uinput_access(device: &Path) -> Result<()> {
    if !device.exists() {
        // Синтетический ввод не будет работать, но навигация и рассылка через xdotool останутся
        warn!("{} не существует, возможно модуль uinput не загружен", device.display());
        return Ok(());
    }

    let metadata = fs::metadata(device).map_err(|e| {
        mbox_error!(
            permission,
            "Не удалось проверить права доступа к {}: {}",
            device.display(),
            e
        )
    })?;

    if !mode_allows_group_or_other(metadata.permissions().mode()) {
        return Err(mbox_error!(
            permission,
            "Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'",
            device.display()
        ));
    }

    info!("Доступ к {} подтвержден", device.display());
    Ok(())
}

// Обычно 660 или 666
fn mode_allows_group_or_other(mode: u32) -> bool {
    mode & 0o006 != 0 || mode & 0o060 != 0
}

/// xdotool и wmctrl работают только при наличии X-дисплея
fn check_display() {
    match std::env::var("DISPLAY") {
        Ok(value) if !value.is_empty() => info!("X-дисплей: {}", value),
        _ => warn!("Переменная DISPLAY не задана: xdotool и wmctrl могут не работать"),
    }
}

/// Рекомендуемые команды для настройки прав доступа
pub fn setup_commands() -> Vec<String> {
    vec![
        "# Добавить пользователя в необходимые группы:".to_string(),
        "sudo usermod -a -G input,uinput $USER".to_string(),
        "".to_string(),
        "# Загрузить модуль uinput:".to_string(),
        "sudo modprobe uinput".to_string(),
        "".to_string(),
        "# Установить утилиты управления окнами:".to_string(),
        "sudo apt install xdotool wmctrl".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MboxError;

    #[test]
    fn test_setup_commands() {
        let commands = setup_commands();
        assert!(commands.iter().any(|cmd| cmd.contains("usermod")));
        assert!(commands.iter().any(|cmd| cmd.contains("xdotool")));
    }

    #[test]
    fn test_mode_check() {
        assert!(mode_allows_group_or_other(0o660));
        assert!(mode_allows_group_or_other(0o666));
        assert!(!mode_allows_group_or_other(0o600));
    }

    #[test]
    fn test_missing_input_dir_is_permission_error() {
        let result = check_input_devices_access(Path::new("/nonexistent/mbox-input"));
        assert!(matches!(result, Err(MboxError::Permission(_))));
    }

    #[test]
    fn test_missing_uinput_is_tolerated() {
        assert!(check_uinput_access(Path::new("/nonexistent/mbox-uinput")).is_ok());
    }

    #[test]
    fn test_display_check_only_logs() {
        // Без DISPLAY и с ним проверка лишь пишет в лог
        check_display();
    }
}
