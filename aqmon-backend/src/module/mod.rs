pub mod classifier;
pub mod dashboard;
pub mod dispatcher;
pub mod feed;
pub mod filter;
pub mod geolocation;
pub mod projector;
pub mod renderer;
pub mod scheduled;
pub mod snapshot;
pub mod status;
pub mod sync;
