pub mod phone;
pub mod response;
pub mod validation;

pub use phone::normalize_kenyan_phone;
pub use response::{ApiError, ApiResponse};
pub use validation::{
    validate_id_number, validate_new_password, validate_phone, validate_registration,
    validate_username, FieldViolation,
};
