pub mod kyc;
pub mod otp;
pub mod user;

pub use kyc::*;
pub use otp::*;
pub use user::*;
