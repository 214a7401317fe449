pub mod info;
pub mod unlock;

pub use info::*;
pub use unlock::*;
