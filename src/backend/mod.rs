// src/backend/mod.rs
// Execution substrate: tensor allocation, work submission and completion

pub mod command;
pub mod device;


pub use command::{CommandBuffer, Completion, ItemStatus};
pub use device::Device;
pub use device::cpu;
pub use device::default_device;
