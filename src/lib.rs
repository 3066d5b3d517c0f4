//! SPF record analysis: term grammar, record model, and DNS resource-limit
//! auditing (RFC 7208).
//!
//! This crate validates SPF policy structure and counts lookup-consuming
//! terms; it does not match a sending IP against the policy. DNS caching is
//! the caller's responsibility — implement [`common::dns::DnsResolver`]
//! with caching at the resolver layer.

pub mod common;
pub mod spf;
