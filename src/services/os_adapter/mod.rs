pub mod dry_run;
pub mod input_devices;
pub mod r#trait;
pub mod virtual_device;
pub mod wmctrl;
pub mod x11;
pub mod xdotool;

#[cfg(test)]
pub use dry_run::{AdapterCall, DryRunAdapter, FocusBehavior};
pub use r#trait::{create_window_adapter, WindowAdapter};
pub use virtual_device::VIRTUAL_DEVICE_NAME;
