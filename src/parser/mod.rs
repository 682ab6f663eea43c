pub mod classify;
pub mod record;

pub use classify::*;
pub use record::*;
