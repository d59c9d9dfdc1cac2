pub mod application;
pub mod payment;
pub mod product;
pub mod user;
pub mod visa;
