pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod fixes;
pub mod git;
pub mod mail;
pub mod pipeline;
pub mod report;
pub mod series;
pub mod types;
pub mod upstream;
