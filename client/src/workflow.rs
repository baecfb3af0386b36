//! Deposit Submission Handler
//!
//! Drives one logged-in user through repeated deposit attempts:
//!
//! ```text
//! login → open_bin_scanner → handle_bin_scan (geolocate, distance check)
//!       → [open_product_scanner → handle_product_scan] → [attach_photo]
//!       → select_material / set_weight_input / set_brand → submit
//! ```
//!
//! Every failure leaves a user-facing [`Notice`] and returns the session to
//! the idle state of the failed step. Nothing is retried automatically.

use std::sync::Arc;

use crate::api::LedgerApi;
use crate::beacon::BinBeacon;
use crate::config::WorkflowConfig;
use crate::device::{Geolocator, PhotoEvidence};
use crate::error::ClientError;
use crate::form::DepositForm;
use crate::geo::haversine_distance_m;
use crate::session::{ScanEvent, ScanSession};
use crate::types::{DepositReceipt, Material, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Latest message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Result of a completed deposit
#[derive(Debug, Clone, PartialEq)]
pub struct DepositOutcome {
    pub receipt: DepositReceipt,
    /// User as re-fetched from the server after the deposit
    pub user: User,
}

pub struct DepositWorkflow {
    api: Arc<dyn LedgerApi>,
    geolocator: Arc<dyn Geolocator>,
    config: WorkflowConfig,
    user: Option<User>,
    materials: Vec<Material>,
    session: ScanSession,
    form: DepositForm,
    notice: Option<Notice>,
}

impl DepositWorkflow {
    pub fn new(
        api: Arc<dyn LedgerApi>,
        geolocator: Arc<dyn Geolocator>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            api,
            geolocator,
            session: ScanSession::new(config.profile, config.proximity_threshold_m),
            config,
            user: None,
            materials: Vec::new(),
            form: DepositForm::default(),
            notice: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn form(&self) -> &DepositForm {
        &self.form
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Identify the user and load the material catalogue
    ///
    /// Starts a fresh scan session: evidence history from a previous login
    /// does not carry over.
    pub async fn login(&mut self, email: &str) -> Result<User, ClientError> {
        let user = match self.api.login(email).await {
            Ok(user) => user,
            Err(e) => return self.fail(e.into()),
        };

        let materials = match self.api.materials().await {
            Ok(materials) => materials,
            Err(e) => return self.fail(e.into()),
        };

        tracing::info!(target: "ecotrace_client::workflow", user_id = user.id, materials = materials.len(), "Logged in");

        self.user = Some(user.clone());
        self.materials = materials;
        self.session = ScanSession::new(self.config.profile, self.config.proximity_threshold_m);
        self.form.clear();
        self.notice = None;

        Ok(user)
    }

    pub fn open_bin_scanner(&mut self) -> Result<(), ClientError> {
        self.require_user()?;
        self.step(ScanEvent::OpenBinScanner)
    }

    /// Handle a decoded bin QR payload
    ///
    /// Returns the measured distance when the bin is within range. The
    /// distance stays available through the session in both outcomes.
    pub async fn handle_bin_scan(&mut self, payload: &str) -> Result<f64, ClientError> {
        self.require_user()?;
        if !self.session.can(ScanEvent::BeaconDecoded) {
            let err = self.invalid(ScanEvent::BeaconDecoded);
            return self.fail(err);
        }

        let beacon = match BinBeacon::parse(payload) {
            Ok(beacon) => beacon,
            Err(e) => {
                self.session.apply(ScanEvent::BeaconRejected)?;
                return self.fail(e);
            }
        };
        self.session.apply(ScanEvent::BeaconDecoded)?;

        let position = match self.geolocator.current_position().await {
            Ok(position) => position,
            Err(e) => {
                self.session.apply(ScanEvent::LocationFailed)?;
                return self.fail(e.into());
            }
        };

        let distance_m = haversine_distance_m(position, beacon.location);
        match self.session.record_distance(distance_m) {
            Ok(()) => {
                tracing::info!(target: "ecotrace_client::workflow", distance_m, "Bin validated");
                self.notice = Some(Notice::success(format!(
                    "Bin verified ({} m).",
                    distance_m.round()
                )));
                Ok(distance_m)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Close whichever scanner is open
    pub fn cancel_scan(&mut self) -> Result<(), ClientError> {
        self.step(ScanEvent::Cancel)
    }

    pub fn open_product_scanner(&mut self) -> Result<(), ClientError> {
        self.step(ScanEvent::OpenProductScanner)
    }

    /// Handle a decoded product barcode; empty reads keep the scanner open
    pub fn handle_product_scan(&mut self, code: &str) -> Result<(), ClientError> {
        if code.trim().is_empty() {
            return Ok(());
        }

        match self.session.accept_barcode(code) {
            Ok(()) => {
                self.notice = Some(Notice::success("Barcode captured."));
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Attach the evidence photo; returns its fingerprint
    pub fn attach_photo(&mut self, photo: &PhotoEvidence) -> Result<String, ClientError> {
        let fingerprint = self.config.fingerprint.fingerprint(photo);

        match self.session.accept_photo(fingerprint.clone()) {
            Ok(()) => {
                self.notice = Some(Notice::success("Photo attached."));
                Ok(fingerprint)
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn select_material(&mut self, material_id: i64) -> Result<(), ClientError> {
        if !self.materials.is_empty() && !self.materials.iter().any(|m| m.id == material_id) {
            return self.fail(ClientError::MaterialNotFound(material_id.to_string()));
        }

        self.form.material_id = Some(material_id);
        Ok(())
    }

    /// Look a material up by case-insensitive name
    pub fn material_by_name(&self, name: &str) -> Option<&Material> {
        let name = name.trim();
        self.materials
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn set_weight_input(&mut self, weight: &str) {
        self.form.weight_input = weight.to_string();
    }

    pub fn set_brand(&mut self, brand: &str) {
        self.form.brand = brand.to_string();
    }

    /// Submit the current attempt
    ///
    /// Local checks run first and make no network call. Once the server has
    /// credited the deposit the session resets and its evidence is recorded
    /// as used; the user is then re-fetched for the authoritative balance,
    /// falling back to the receipt balance if that fails. If the deposit
    /// itself fails the form keeps its values.
    pub async fn submit(&mut self) -> Result<DepositOutcome, ClientError> {
        let user_id = self.require_user()?.id;

        if !self.session.can(ScanEvent::SubmitStarted) {
            let err = self.invalid(ScanEvent::SubmitStarted);
            return self.fail(err);
        }

        let request = match self.form.to_request(user_id, &self.session) {
            Ok(request) => request,
            Err(e) => return self.fail(e),
        };

        self.session.apply(ScanEvent::SubmitStarted)?;

        let response = match self.api.deposit(&request).await {
            Ok(response) => response,
            Err(e) => return self.submit_failed(e.to_string()),
        };

        // Credited: the evidence is consumed whatever the refresh does
        self.session.complete_submission()?;
        self.form.clear();

        tracing::info!(
            target: "ecotrace_client::workflow",
            deposit_id = response.receipt.deposit_id,
            points = response.receipt.points_awarded,
            balance = response.receipt.balance,
            "Deposit recorded"
        );

        let user = match self.api.user(user_id).await {
            Ok(user) => {
                self.notice = Some(Notice::success(format!(
                    "Congratulations! You earned {} eco-points.",
                    response.receipt.points_awarded
                )));
                user
            }
            Err(e) => {
                tracing::warn!(target: "ecotrace_client::workflow", error = %e, "Balance refresh failed");
                self.notice = Some(Notice::success(format!(
                    "You earned {} eco-points. Balance shown from the deposit receipt.",
                    response.receipt.points_awarded
                )));
                self.balance_from_receipt(&response.receipt)?
            }
        };
        self.user = Some(user.clone());

        Ok(DepositOutcome {
            receipt: response.receipt,
            user,
        })
    }

    /// Drop the current attempt
    pub fn abandon(&mut self) -> Result<(), ClientError> {
        if let Err(e) = self.session.abandon() {
            return self.fail(e);
        }
        self.form.clear();
        Ok(())
    }

    fn balance_from_receipt(&self, receipt: &DepositReceipt) -> Result<User, ClientError> {
        let mut user = self.require_user()?.clone();
        user.points = receipt.balance;
        Ok(user)
    }

    fn submit_failed<T>(&mut self, reason: String) -> Result<T, ClientError> {
        self.session.apply(ScanEvent::SubmitFailed)?;
        self.fail(ClientError::ServerError(reason))
    }

    fn step(&mut self, event: ScanEvent) -> Result<(), ClientError> {
        match self.session.apply(event) {
            Ok(_) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    fn require_user(&self) -> Result<&User, ClientError> {
        self.user.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    fn invalid(&self, event: ScanEvent) -> ClientError {
        ClientError::InvalidTransition {
            from: self.session.state(),
            event,
        }
    }

    fn fail<T>(&mut self, error: ClientError) -> Result<T, ClientError> {
        tracing::warn!(target: "ecotrace_client::workflow", error = %error, "Step failed");
        self.notice = Some(Notice::error(error.user_message()));
        Err(error)
    }
}
