pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Access, Ext, Git, Identity, Init, Key, Lock, Status, Unlock, Version};
