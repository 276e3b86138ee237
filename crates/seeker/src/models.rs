//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - openai chat completion messages/tools, sent from the agent to the LLM
//! - tool requests, sent from the agent to the tool registry
//!
//! We always immediately convert wire formats into the internal structs using the helpers
//! in `providers::utils`, so these models are not an exact match to any provider format.
pub mod message;
pub mod role;
pub mod tool;
