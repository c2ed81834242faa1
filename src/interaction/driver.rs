//! Desktop input and screen capture.
//!
//! [`HeadlessDriver`] keeps everything in memory and is what tests and
//! servers use. [`NativeDriver`] talks to the real display and is only built
//! with the `desktop` feature.

use std::sync::Mutex;

use image::{Rgba, RgbaImage};

use super::action::MouseButton;
use super::InteractionError;

pub trait DesktopDriver: Send + Sync {
    fn screen_size(&self) -> Result<(u32, u32), InteractionError>;
    fn move_mouse(&self, x: i32, y: i32) -> Result<(), InteractionError>;
    fn click(&self, button: MouseButton) -> Result<(), InteractionError>;
    fn type_text(&self, text: &str) -> Result<(), InteractionError>;
    /// Press `keys` together (a chord), then release them in reverse order.
    fn press_keys(&self, keys: &[String]) -> Result<(), InteractionError>;
    fn scroll(&self, amount: i32) -> Result<(), InteractionError>;
    fn capture_screen(&self) -> Result<RgbaImage, InteractionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    MoveMouse(i32, i32),
    Click(MouseButton),
    TypeText(String),
    PressKeys(Vec<String>),
    Scroll(i32),
    Capture,
}

/// In-memory driver: records every call and serves a fixed frame.
#[derive(Debug)]
pub struct HeadlessDriver {
    size: (u32, u32),
    frame: Mutex<RgbaImage>,
    calls: Mutex<Vec<DriverCall>>,
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl HeadlessDriver {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            frame: Mutex::new(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_frame(self, frame: RgbaImage) -> Self {
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) = frame;
        self
    }

    pub fn set_frame(&self, frame: RgbaImage) {
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) = frame;
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

impl DesktopDriver for HeadlessDriver {
    fn screen_size(&self) -> Result<(u32, u32), InteractionError> {
        Ok(self.size)
    }

    fn move_mouse(&self, x: i32, y: i32) -> Result<(), InteractionError> {
        self.record(DriverCall::MoveMouse(x, y));
        Ok(())
    }

    fn click(&self, button: MouseButton) -> Result<(), InteractionError> {
        self.record(DriverCall::Click(button));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), InteractionError> {
        self.record(DriverCall::TypeText(text.to_string()));
        Ok(())
    }

    fn press_keys(&self, keys: &[String]) -> Result<(), InteractionError> {
        self.record(DriverCall::PressKeys(keys.to_vec()));
        Ok(())
    }

    fn scroll(&self, amount: i32) -> Result<(), InteractionError> {
        self.record(DriverCall::Scroll(amount));
        Ok(())
    }

    fn capture_screen(&self) -> Result<RgbaImage, InteractionError> {
        self.record(DriverCall::Capture);
        Ok(self.frame.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

#[cfg(feature = "desktop")]
pub use native::NativeDriver;

#[cfg(feature = "desktop")]
mod native {
    use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
    use image::RgbaImage;
    use tracing::debug;

    use super::DesktopDriver;
    use crate::interaction::action::MouseButton;
    use crate::interaction::InteractionError;

    fn driver_err(e: impl std::fmt::Display) -> InteractionError {
        InteractionError::Driver(e.to_string())
    }

    fn parse_key(name: &str) -> Result<Key, InteractionError> {
        let key = match name.to_lowercase().as_str() {
            "ctrl" | "control" => Key::Control,
            "shift" => Key::Shift,
            "alt" => Key::Alt,
            "meta" | "cmd" | "win" | "super" => Key::Meta,
            "enter" | "return" => Key::Return,
            "tab" => Key::Tab,
            "esc" | "escape" => Key::Escape,
            "space" => Key::Space,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => return Err(InteractionError::Driver(format!("unknown key '{name}'"))),
                }
            }
        };
        Ok(key)
    }

    /// Native input via `enigo` and capture via `xcap`. A fresh `Enigo`
    /// connection is opened per call.
    #[derive(Debug, Default)]
    pub struct NativeDriver;

    impl NativeDriver {
        pub fn new() -> Self {
            Self
        }

        fn enigo(&self) -> Result<Enigo, InteractionError> {
            Enigo::new(&Settings::default()).map_err(driver_err)
        }
    }

    impl DesktopDriver for NativeDriver {
        fn screen_size(&self) -> Result<(u32, u32), InteractionError> {
            let (w, h) = self.enigo()?.main_display().map_err(driver_err)?;
            Ok((w.max(0) as u32, h.max(0) as u32))
        }

        fn move_mouse(&self, x: i32, y: i32) -> Result<(), InteractionError> {
            self.enigo()?.move_mouse(x, y, Coordinate::Abs).map_err(driver_err)
        }

        fn click(&self, button: MouseButton) -> Result<(), InteractionError> {
            let button = match button {
                MouseButton::Left => Button::Left,
                MouseButton::Right => Button::Right,
                MouseButton::Middle => Button::Middle,
            };
            self.enigo()?.button(button, Direction::Click).map_err(driver_err)
        }

        fn type_text(&self, text: &str) -> Result<(), InteractionError> {
            self.enigo()?.text(text).map_err(driver_err)
        }

        fn press_keys(&self, keys: &[String]) -> Result<(), InteractionError> {
            let keys = keys.iter().map(|k| parse_key(k)).collect::<Result<Vec<_>, _>>()?;
            let mut enigo = self.enigo()?;
            for key in &keys {
                enigo.key(*key, Direction::Press).map_err(driver_err)?;
            }
            for key in keys.iter().rev() {
                enigo.key(*key, Direction::Release).map_err(driver_err)?;
            }
            Ok(())
        }

        fn scroll(&self, amount: i32) -> Result<(), InteractionError> {
            self.enigo()?.scroll(amount, Axis::Vertical).map_err(driver_err)
        }

        fn capture_screen(&self) -> Result<RgbaImage, InteractionError> {
            let monitors = xcap::Monitor::all().map_err(driver_err)?;
            let monitor = monitors
                .iter()
                .find(|m| m.is_primary())
                .or_else(|| monitors.first())
                .ok_or_else(|| InteractionError::Driver("no monitor found".to_string()))?;
            let frame = monitor.capture_image().map_err(driver_err)?;
            let (width, height) = (frame.width(), frame.height());
            debug!("Captured {}x{} frame", width, height);
            // xcap may link a different `image` release; rebuild from raw bytes.
            RgbaImage::from_raw(width, height, frame.into_raw())
                .ok_or_else(|| InteractionError::Driver("captured frame has wrong size".to_string()))
        }
    }
}
