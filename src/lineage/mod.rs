//! Lineage graphs: per-statement detail, per-script summary, cross-script global

pub mod detail;
pub mod global;
pub mod node_link;
pub mod summary;

pub use detail::*;
pub use global::*;
pub use node_link::*;
pub use summary::*;
