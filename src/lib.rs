pub mod feed;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod series;
pub mod snapshot;
pub mod state;
