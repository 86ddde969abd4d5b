//! HTTP implementation of [`tofui_core::ContentService`] plus a store-backed
//! read-through cache.

mod cache;
mod client;
mod wire;

pub use cache::CachedContentService;
pub use client::{ApiClient, ApiConfig, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
