//! Dashboard Server API
//!
//! The request/response contract the sync engine consumes:
//!
//! - `GET /api/data`: full snapshot, active identity and system mode
//! - `POST /api/save`: persist a snapshot (optionally changing the password)
//! - `POST /api/login`, `POST /api/register`: obtain a session token
//!
//! [`DashboardApi`] is the seam the engine is written against; [`HttpApi`]
//! is the `reqwest` implementation used in production.

mod client;
mod dto;
mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{DashboardApi, HttpApi, HttpApiConfig, SESSION_HEADER};
pub use dto::{AuthContext, AuthResponse, Credentials, DataResponse, SaveRequest, SystemMode};
pub use error::ApiError;
