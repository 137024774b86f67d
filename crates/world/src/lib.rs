#![warn(missing_docs)]
//! Containers, the anchors that own them and the world they live in.

mod allocator;
mod anchor;
mod container;
mod drop_item;
mod persistence;
mod signals;
mod viewer;
mod world;

pub use allocator::*;
pub use anchor::*;
pub use container::*;
pub use drop_item::*;
pub use persistence::*;
pub use signals::*;
pub use viewer::*;
pub use world::*;
