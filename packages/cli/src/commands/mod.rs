pub mod check;
pub mod replay;

pub use check::{check, CheckArgs};
pub use replay::{replay, ReplayArgs};
