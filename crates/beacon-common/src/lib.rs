//! Beacon Common Types and Protocol
//!
//! This crate provides the shared model and contracts for the beacon
//! service-discovery platform.
//!
//! # Overview
//!
//! Beacon clients resolve a ranked list of server endpoints and talk to them
//! through a decorated HTTP client stack; beacon servers cache registry
//! responses and replicate to their peers. Everything both sides agree on
//! lives here:
//!
//! - **Endpoints**: addressable server instances with region/zone placement
//! - **Registry model**: instances, applications and application sets
//! - **Protocol**: the uniform request operations and the response envelope
//! - **Transport contract**: the seam the wire transport plugs into
//! - **Configuration**: plain structs with the platform defaults
//! - **Errors**: one error enum shared by the whole pipeline
//!
//! # Example
//!
//! ```
//! use beacon_common::endpoint::Endpoint;
//!
//! let endpoint = Endpoint::new("discovery-1.example.net", 8080, false, "/v2/");
//! assert_eq!(endpoint.service_url(), "http://discovery-1.example.net:8080/v2/");
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use config::{ClientConfig, ServerConfig, TransportConfig, DEFAULT_ZONE};
pub use endpoint::Endpoint;
pub use error::{DiscoveryError, Result};
pub use protocol::{Request, RequestKind, Response};
pub use registry::{Application, Applications, InstanceInfo, InstanceStatus};
pub use transport::{TransportClient, TransportFactory};
