pub mod bucket;
pub mod failures;
