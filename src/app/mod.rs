pub mod auto_capture;
pub mod controller;
pub mod recorder;

pub use auto_capture::AutoCapture;
pub use controller::{BusyFlag, BusyGuard, FieldConsole};
pub use recorder::{record_and_submit, record_until, spawn_meter_printer};
