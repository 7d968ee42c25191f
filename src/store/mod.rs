pub mod linked_map;
pub mod node;
pub mod traits;

pub use linked_map::LinkedMapStore;
pub use node::NodeStore;
pub use traits::{DefaultHashBuilder, RecencyStore};
