pub mod subscription;
pub mod token;

pub use subscription::*;
pub use token::*;
