pub mod canonical;
pub mod jobs;
pub mod model;
pub mod pins;
pub mod remote;
pub mod store;
pub mod stream;
pub mod sync;
pub mod workspace;
