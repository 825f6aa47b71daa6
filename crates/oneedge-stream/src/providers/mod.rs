//! Vendor-specific integrations and extension traits.
pub mod openai;
