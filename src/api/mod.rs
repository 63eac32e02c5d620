//! API route definitions
//!
//! `/api/album` exposes the album sensor; `/healthz` and `/readyz` report
//! process and service health.

pub mod album;
pub mod health;
