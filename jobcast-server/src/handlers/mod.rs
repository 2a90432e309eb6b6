pub mod jobs;
pub mod utils;
