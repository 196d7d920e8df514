/**
 * Routes Module
 * API route handlers
 */
use serde::{Deserialize, Serialize};

pub mod auth;
pub mod health;
pub mod portfolio;
pub mod resources;
pub mod roles;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

/// Plain acknowledgement body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
