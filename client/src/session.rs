//! Scan Session Controller
//!
//! One explicit state machine drives a deposit attempt:
//!
//! ```text
//! AwaitingBinScan → BinScanInProgress → Locating → BinValidated
//!     → ProductScanInProgress → ProductCaptured → Submitting → AwaitingBinScan
//! ```
//!
//! Failed steps land back in the idle state for that step. Only one scanner
//! can be open at a time because no state allows opening a second one.
//!
//! Evidence history (barcodes and photo fingerprints that went into completed
//! deposits) survives [`ScanSession::reset`] and lives as long as the session.

use std::collections::HashSet;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    AwaitingBinScan,
    BinScanInProgress,
    Locating,
    /// Bin within range; the deposit form is unlocked
    BinValidated,
    ProductScanInProgress { captured: bool },
    ProductCaptured,
    Submitting { captured: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    OpenBinScanner,
    BeaconDecoded,
    BeaconRejected,
    Cancel,
    WithinRange,
    OutOfRange,
    LocationFailed,
    OpenProductScanner,
    BarcodeAccepted,
    BarcodeRejected,
    PhotoAttached,
    SubmitStarted,
    SubmitSucceeded,
    SubmitFailed,
    Abandon,
}

impl ScanState {
    /// Transition table; `None` means the event is not allowed in this state
    pub fn next(self, event: ScanEvent) -> Option<ScanState> {
        use ScanEvent::*;
        use ScanState::*;

        let unlocked = |captured: bool| if captured { ProductCaptured } else { BinValidated };

        match (self, event) {
            (AwaitingBinScan, OpenBinScanner) => Some(BinScanInProgress),
            (BinScanInProgress, BeaconDecoded) => Some(Locating),
            (BinScanInProgress, BeaconRejected) => Some(AwaitingBinScan),
            (BinScanInProgress | Locating, Cancel) => Some(AwaitingBinScan),
            (Locating, WithinRange) => Some(BinValidated),
            (Locating, OutOfRange | LocationFailed) => Some(AwaitingBinScan),
            (BinValidated, OpenProductScanner) => Some(ProductScanInProgress { captured: false }),
            (ProductCaptured, OpenProductScanner) => Some(ProductScanInProgress { captured: true }),
            (ProductScanInProgress { .. }, BarcodeAccepted) => Some(ProductCaptured),
            (ProductScanInProgress { captured }, BarcodeRejected | Cancel) => {
                Some(unlocked(captured))
            }
            (BinValidated | ProductCaptured, PhotoAttached) => Some(self),
            (BinValidated, SubmitStarted) => Some(Submitting { captured: false }),
            (ProductCaptured, SubmitStarted) => Some(Submitting { captured: true }),
            (Submitting { .. }, SubmitSucceeded) => Some(AwaitingBinScan),
            (Submitting { captured }, SubmitFailed) => Some(unlocked(captured)),
            (BinValidated | ProductCaptured, Abandon) => Some(AwaitingBinScan),
            _ => None,
        }
    }

    /// The bin was validated and the deposit form is unlocked
    pub fn bin_validated(&self) -> bool {
        matches!(
            self,
            ScanState::BinValidated
                | ScanState::ProductScanInProgress { .. }
                | ScanState::ProductCaptured
                | ScanState::Submitting { .. }
        )
    }
}

/// Which evidence a deposit requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProfile {
    pub require_product_scan: bool,
    pub require_photo_evidence: bool,
    pub require_brand: bool,
}

impl ScanProfile {
    /// Bin proximity, material and weight only
    pub fn basic() -> Self {
        Self {
            require_product_scan: false,
            require_photo_evidence: false,
            require_brand: false,
        }
    }

    /// Adds brand, product barcode and photo evidence
    pub fn extended() -> Self {
        Self {
            require_product_scan: true,
            require_photo_evidence: true,
            require_brand: true,
        }
    }
}

impl Default for ScanProfile {
    fn default() -> Self {
        Self::extended()
    }
}

impl std::str::FromStr for ScanProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::basic()),
            "extended" => Ok(Self::extended()),
            other => Err(format!(
                "unknown profile '{}' (expected basic or extended)",
                other
            )),
        }
    }
}

/// Barcodes and photo fingerprints consumed by completed deposits
#[derive(Debug, Clone, Default)]
pub struct EvidenceHistory {
    barcodes: HashSet<String>,
    photos: HashSet<String>,
}

impl EvidenceHistory {
    pub fn barcode_used(&self, code: &str) -> bool {
        self.barcodes.contains(code)
    }

    pub fn photo_used(&self, fingerprint: &str) -> bool {
        self.photos.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.barcodes.len() + self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Client-side state of the current deposit attempt
#[derive(Debug, Clone)]
pub struct ScanSession {
    state: ScanState,
    profile: ScanProfile,
    threshold_m: f64,
    last_distance_m: Option<f64>,
    barcode: Option<String>,
    photo_fingerprint: Option<String>,
    history: EvidenceHistory,
}

impl ScanSession {
    pub fn new(profile: ScanProfile, threshold_m: f64) -> Self {
        Self {
            state: ScanState::AwaitingBinScan,
            profile,
            threshold_m,
            last_distance_m: None,
            barcode: None,
            photo_fingerprint: None,
            history: EvidenceHistory::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn profile(&self) -> ScanProfile {
        self.profile
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Distance measured by the latest bin scan, shown whether or not it passed
    pub fn last_distance_m(&self) -> Option<f64> {
        self.last_distance_m
    }

    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    pub fn photo_fingerprint(&self) -> Option<&str> {
        self.photo_fingerprint.as_deref()
    }

    pub fn history(&self) -> &EvidenceHistory {
        &self.history
    }

    pub fn can(&self, event: ScanEvent) -> bool {
        self.state.next(event).is_some()
    }

    /// Apply `event`, leaving the session untouched if it is not allowed
    pub fn apply(&mut self, event: ScanEvent) -> Result<ScanState, ClientError> {
        let next = self.state.next(event).ok_or(ClientError::InvalidTransition {
            from: self.state,
            event,
        })?;

        tracing::debug!(target: "ecotrace_client::session", from = ?self.state, ?event, to = ?next, "Scan transition");
        self.state = next;
        Ok(next)
    }

    /// Resolve a `Locating` step with a measured distance
    ///
    /// `distance_m <= threshold` validates the bin.
    pub fn record_distance(&mut self, distance_m: f64) -> Result<(), ClientError> {
        if distance_m <= self.threshold_m {
            self.apply(ScanEvent::WithinRange)?;
            self.last_distance_m = Some(distance_m);
            Ok(())
        } else {
            self.apply(ScanEvent::OutOfRange)?;
            self.last_distance_m = Some(distance_m);
            Err(ClientError::OutOfRange {
                distance_m,
                threshold_m: self.threshold_m,
            })
        }
    }

    /// Resolve a product scan with a decoded barcode
    ///
    /// A code consumed by an earlier deposit closes the scanner without
    /// replacing the currently captured code.
    pub fn accept_barcode(&mut self, code: &str) -> Result<(), ClientError> {
        let code = code.trim();

        if self.history.barcode_used(code) {
            self.apply(ScanEvent::BarcodeRejected)?;
            return Err(ClientError::DuplicateBarcode(code.to_string()));
        }

        self.apply(ScanEvent::BarcodeAccepted)?;
        self.barcode = Some(code.to_string());
        Ok(())
    }

    /// Attach a photo fingerprint to the current attempt
    pub fn accept_photo(&mut self, fingerprint: String) -> Result<(), ClientError> {
        if !self.can(ScanEvent::PhotoAttached) {
            return Err(ClientError::InvalidTransition {
                from: self.state,
                event: ScanEvent::PhotoAttached,
            });
        }

        if self.history.photo_used(&fingerprint) {
            return Err(ClientError::DuplicatePhoto(fingerprint));
        }

        self.apply(ScanEvent::PhotoAttached)?;
        self.photo_fingerprint = Some(fingerprint);
        Ok(())
    }

    /// Every piece of evidence the profile asks for is present
    pub fn ready_to_submit(&self) -> bool {
        matches!(self.state, ScanState::BinValidated | ScanState::ProductCaptured)
            && (!self.profile.require_product_scan || self.barcode.is_some())
            && (!self.profile.require_photo_evidence || self.photo_fingerprint.is_some())
    }

    /// Finish a successful submission: consume the evidence and reset
    pub fn complete_submission(&mut self) -> Result<(), ClientError> {
        self.apply(ScanEvent::SubmitSucceeded)?;

        if let Some(code) = self.barcode.take() {
            self.history.barcodes.insert(code);
        }
        if let Some(fingerprint) = self.photo_fingerprint.take() {
            self.history.photos.insert(fingerprint);
        }

        self.reset();
        Ok(())
    }

    /// Drop the current attempt and start over
    pub fn abandon(&mut self) -> Result<(), ClientError> {
        self.apply(ScanEvent::Abandon)?;
        self.reset();
        Ok(())
    }

    /// Back to `AwaitingBinScan`, keeping the evidence history
    pub fn reset(&mut self) {
        self.state = ScanState::AwaitingBinScan;
        self.last_distance_m = None;
        self.barcode = None;
        self.photo_fingerprint = None;
    }
}
