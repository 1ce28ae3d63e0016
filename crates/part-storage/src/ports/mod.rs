//! # Ports Layer
//!
//! Defines the port traits for the Part Storage subsystem.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (read API shared by storages and builders)
//! - `outbound.rs` - Driven ports (disk and volume required by the service)

pub mod inbound;
pub mod outbound;
