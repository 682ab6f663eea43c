pub mod conflict;
pub mod consolidate;
pub mod dependencies;
pub mod types;

pub use conflict::*;
pub use consolidate::*;
pub use dependencies::*;
pub use types::*;
