pub mod clob;

pub use clob::{RestClient, RestError};
