pub mod config;
pub mod errors;
pub mod judge;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod sandbox;
pub mod service;

pub mod report;
pub mod validate;
