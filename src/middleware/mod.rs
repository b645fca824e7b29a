pub mod cookie_policy;
pub mod error_page;
pub mod https;
