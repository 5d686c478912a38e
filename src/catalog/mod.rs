//! Persistent catalog of registered tool-servers.
//!
//! Records carry the owner, a unique name and the serialized connection
//! descriptor. Names are never overwritten: a colliding registration is
//! stored under a timestamp-suffixed name instead.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
