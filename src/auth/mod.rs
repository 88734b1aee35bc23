pub mod extractor;
pub mod identity;
pub mod jwt;
pub mod password;
