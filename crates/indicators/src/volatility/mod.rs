pub mod atr;

pub use atr::*;
