pub mod client;
pub mod source;
pub mod validate;
