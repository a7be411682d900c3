// Library for tests to access modules

pub mod catalog;
pub mod config;
pub mod delta;
pub mod error;
pub mod models;
pub mod sampler;
pub mod source;
pub mod spec;
pub mod store;
pub mod worker;
