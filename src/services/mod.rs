pub mod auth;
pub mod clock;
pub mod error;
pub mod jwt;
pub mod sms;
pub mod throttle;

pub use auth::{AuthService, LoginOutput};
pub use clock::{Clock, CodeSource, RandomCodeSource, SystemClock};
pub use error::AuthError;
pub use jwt::{JwtService, TokenPair};
pub use sms::{AfricasTalkingService, Notifier};
pub use throttle::RateLimiter;
