mod time;
pub use time::*;

mod serde;
pub use self::serde::*;
