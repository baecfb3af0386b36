//! EcoTrace Scan Client
//!
//! Client side of a recycling deposit: proximity check against a bin's QR
//! beacon, product barcode and photo evidence with per-session duplicate
//! detection, and submission to the EcoTrace API.
//!
//! ## Modules
//!
//! - `geo` / `beacon`: haversine distance and bin QR decoding
//! - `session`: scan state machine and evidence history
//! - `form` / `workflow`: deposit form checks and the submission handler
//! - `api`: `LedgerApi` trait and its reqwest implementation
//! - `device`: geolocation and photo capture seams

pub mod api;
pub mod beacon;
pub mod config;
pub mod device;
pub mod error;
pub mod fingerprint;
pub mod form;
pub mod geo;
pub mod session;
pub mod types;
pub mod workflow;

pub use api::{ApiClientError, HttpLedgerApi, LedgerApi};
pub use beacon::BinBeacon;
pub use config::{ClientConfig, WorkflowConfig};
pub use device::{FixedGeolocator, GeolocationError, Geolocator, PhotoEvidence};
pub use error::ClientError;
pub use fingerprint::FingerprintStrategy;
pub use form::{DepositForm, RequiredField};
pub use geo::{haversine_distance_m, Coordinates, EARTH_RADIUS_KM};
pub use session::{ScanEvent, ScanProfile, ScanSession, ScanState};
pub use workflow::{DepositOutcome, DepositWorkflow, Notice, NoticeKind};
