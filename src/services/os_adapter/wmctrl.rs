use crate::error::{MboxError, Result};
use crate::events::{WindowHandle, WindowRef};
use std::process::Command;

/// Перечисление окон верхнего уровня через `wmctrl -lp`
pub struct Wmctrl;

impl Wmctrl {
    pub fn new() -> Self {
        Self
    }

    pub fn test(&self) -> Result<()> {
        let output = Command::new("wmctrl").args(["-l"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MboxError::ServiceUnavailable("wmctrl вернул ошибку".to_string()))
        }
    }

    pub fn list_windows(&self) -> Result<Vec<WindowRef>> {
        let output = Command::new("wmctrl")
            .args(["-lp"])
            .output()
            .map_err(|e| MboxError::ServiceUnavailable(format!("wmctrl не найден: {}", e)))?;

        if !output.status.success() {
            return Err(MboxError::Internal("wmctrl вернул ошибку".to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_line).collect())
    }
}

/// `0x04000007  0 12345  host Заголовок окна`
///
/// Рабочий стол `-1` означает "липкое" окно; окна без pid (0) пропускаются.
pub fn parse_line(line: &str) -> Option<WindowRef> {
    let mut parts = line.split_whitespace();
    let id = parts.next()?;
    let desktop = parts.next()?;
    let pid = parts.next()?.parse::<u32>().ok()?;
    let _host = parts.next()?;
    let title = parts.collect::<Vec<_>>().join(" ");

    let handle = u64::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
    if pid == 0 {
        return None;
    }

    let mut window = WindowRef::new(WindowHandle(handle), pid, title);
    window.visible = desktop != "-1" || !window.title.is_empty();
    Some(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let window = parse_line("0x04000007  0 12345  archbox World of Warcraft").unwrap();
        assert_eq!(window.handle, WindowHandle(0x0400_0007));
        assert_eq!(window.process_id, 12345);
        assert_eq!(window.title, "World of Warcraft");
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(parse_line("").is_none());
        assert!(parse_line("0x01 0 notapid host title").is_none());
        assert!(parse_line("0x02 0 0 host desktop").is_none());
        assert!(parse_line("zz 0 12 host t").is_none());
    }
}
