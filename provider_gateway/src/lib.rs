//! Request authorization and SSRF-safe download gateway.
//!
//! The gateway sits between untrusted clients and (a) externally supplied
//! content URLs and (b) a backend compute-job dispatcher. For every inbound
//! request it decides whether the caller is who they claim to be (replay
//! resistant signatures over per-identity nonces), whether a target URL is
//! safe to fetch on the server's behalf (anti-SSRF), and then streams the
//! payload back without buffering it, normalizing content type, filename and
//! range semantics along the way.

pub mod api;
pub mod clients;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod fetch;
pub mod nonce;
pub mod urlcheck;
