use crate::error::{MboxError, Result};
use crate::events::{ClientPoint, MouseButton, ScreenPoint, WindowHandle};
use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

/// Геометрия клиентской области окна
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Обёртка над xdotool: фокус, геометрия, курсор и доставка ввода конкретному окну
pub struct Xdotool;

impl Xdotool {
    pub fn new() -> Self {
        Self
    }

    pub fn test(&self) -> Result<()> {
        self.run(&["getactivewindow"]).map(|_| ())
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("xdotool").args(args).output().map_err(|e| {
            debug!("xdotool не найден или не работает: {}", e);
            MboxError::ServiceUnavailable(format!("xdotool не найден: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("xdotool {:?} вернул ошибку: {}", args, stderr.trim());
            return Err(MboxError::Internal(format!("xdotool вернул ошибку: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn activate(&self, handle: WindowHandle) -> bool {
        let id = handle.value().to_string();
        self.run(&["windowactivate", "--sync", &id]).is_ok()
    }

    pub fn window_exists(&self, handle: WindowHandle) -> bool {
        let id = handle.value().to_string();
        self.run(&["getwindowname", &id]).is_ok()
    }

    pub fn geometry(&self, handle: WindowHandle) -> Option<WindowGeometry> {
        let id = handle.value().to_string();
        let output = self.run(&["getwindowgeometry", "--shell", &id]).ok()?;
        parse_geometry(&output)
    }

    pub fn active_window(&self) -> Option<WindowHandle> {
        let output = self.run(&["getactivewindow"]).ok()?;
        output.parse::<u64>().ok().map(WindowHandle)
    }

    pub fn mouse_location(&self) -> Option<ScreenPoint> {
        let output = self.run(&["getmouselocation", "--shell"]).ok()?;
        let vars = parse_shell_vars(&output);
        Some(ScreenPoint::new(*vars.get("X")? as i32, *vars.get("Y")? as i32))
    }

    pub fn mouse_move(&self, point: ScreenPoint) -> bool {
        let (x, y) = (point.x.to_string(), point.y.to_string());
        self.run(&["mousemove", &x, &y]).is_ok()
    }

    /// keydown/keyup через XSendEvent конкретному окну, без передачи фокуса
    pub fn key_to_window(&self, handle: WindowHandle, keysym: &str, pressed: bool) -> bool {
        let id = handle.value().to_string();
        let command = if pressed { "keydown" } else { "keyup" };
        self.run(&[command, "--window", &id, keysym]).is_ok()
    }

    pub fn button_to_window(
        &self,
        handle: WindowHandle,
        button: MouseButton,
        point: ClientPoint,
        pressed: bool,
    ) -> bool {
        let id = handle.value().to_string();
        let number = button.x11_number().to_string();
        let (x, y) = (point.x.to_string(), point.y.to_string());
        if pressed {
            self.run(&[
                "mousemove", "--window", &id, &x, &y,
                "mousedown", "--window", &id, &number,
            ])
            .is_ok()
        } else {
            self.run(&["mouseup", "--window", &id, &number]).is_ok()
        }
    }
}

/// Разбор вывода `--shell`: строки вида `KEY=VALUE`
pub fn parse_shell_vars(output: &str) -> HashMap<&str, i64> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((key.trim(), value.trim().parse::<i64>().ok()?))
        })
        .collect()
}

pub fn parse_geometry(output: &str) -> Option<WindowGeometry> {
    let vars = parse_shell_vars(output);
    Some(WindowGeometry {
        x: *vars.get("X")? as i32,
        y: *vars.get("Y")? as i32,
        width: *vars.get("WIDTH")? as u32,
        height: *vars.get("HEIGHT")? as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        let output = "WINDOW=67108871\nX=640\nY=24\nWIDTH=800\nHEIGHT=600\nSCREEN=0\n";
        assert_eq!(
            parse_geometry(output),
            Some(WindowGeometry { x: 640, y: 24, width: 800, height: 600 })
        );
    }

    #[test]
    fn test_parse_geometry_incomplete() {
        assert_eq!(parse_geometry("X=1\nY=2\n"), None);
        assert_eq!(parse_geometry(""), None);
    }

    #[test]
    fn test_parse_mouse_location() {
        let vars = parse_shell_vars("X=1023\nY=-5\nSCREEN=0\nWINDOW=123\n");
        assert_eq!(vars.get("X"), Some(&1023));
        assert_eq!(vars.get("Y"), Some(&-5));
        assert_eq!(vars.get("WINDOW"), Some(&123));
    }
}
