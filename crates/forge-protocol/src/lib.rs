//! Forge Protocol - Wire contract for the contract pipeline API
//!
//! This crate provides the request and response bodies exchanged with
//! the remote pipeline, the endpoint layout, and conversions from raw
//! payloads into `forge-core` domain types.

pub mod endpoint;
pub mod message;
pub mod parse;

pub use message::{
    CodeRequest, DeployResponse, GenerateRequest, GenerateResponse, RegisterWalletRequest,
    RegisterWalletResponse, TaskAccepted,
};
pub use parse::{ProjectSummary, StatusReport};
