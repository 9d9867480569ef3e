//! Model-callable tools for Bruin.

pub mod alarm;
pub mod notify;

pub use alarm::{CreateAlarmTool, DeleteAlarmTool, ListAlarmsTool, UpdateAlarmTool};
pub use notify::NotifyUsersTool;
