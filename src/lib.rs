pub mod tt;

pub use tt::*;
