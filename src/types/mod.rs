pub mod trading;
pub mod sweep;
pub mod result;

pub use trading::*;
pub use sweep::*;
pub use result::*;
