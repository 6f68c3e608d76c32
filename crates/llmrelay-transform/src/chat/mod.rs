//! Ordered-pair converters. Directory names follow `<client>2<upstream>`:
//! `request.rs` maps the client dialect onto the upstream one, while
//! `response.rs` and `stream.rs` map upstream payloads back to the client.

pub mod responses_frames;
pub mod support;

pub mod claude2gemini;
pub mod claude2openai;
pub mod claude2responses;
pub mod gemini2claude;
pub mod gemini2openai;
pub mod gemini2responses;
pub mod openai2claude;
pub mod openai2gemini;
pub mod openai2responses;
pub mod responses2claude;
pub mod responses2gemini;
pub mod responses2openai;
