pub mod ema;
pub mod ma;
pub mod vdx;

pub use ema::*;
pub use ma::*;
pub use vdx::*;
