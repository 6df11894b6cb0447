pub mod selection;
pub mod snapshot;
