// Library root: configuration, data loading and reporting around the
// gaffer-core engines, shared by the binary and the integration tests.

pub mod config;
pub mod db;
pub mod loader;
pub mod projections;
pub mod report;
pub mod run;
