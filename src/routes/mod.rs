pub mod auth;
pub mod kyc;
