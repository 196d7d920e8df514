/*!
 * Authentication
 * Token issuance, password hashing and OTP codes
 */
pub mod otp;
pub mod password;
pub mod tokens;
