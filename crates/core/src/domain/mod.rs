pub mod attachment;
pub mod request;
