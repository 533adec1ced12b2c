pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod momentum;
pub mod normalize;
pub mod notify;
pub mod poll;
pub mod reconcile;
pub mod seed;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod timeline;

pub use error::PollError;
