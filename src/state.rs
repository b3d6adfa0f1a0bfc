//! De-duplication of validation notifications.
//!
//! Every keystroke is validated, but the listener only hears about a field
//! when its validity actually changes. While a field has never been
//! reported, an invalid result stays quiet until the input can no longer
//! become valid or the field loses focus, so the user is not told off for
//! a half-typed PAN.
//!
//! The manager does not call the listener itself. It returns the
//! [`ValidationEvent`]s to deliver, which lets the controller release its
//! lock before any host code runs.
//!
//! # Example
//!
//! ```
//! use access_checkout::state::{Field, ValidationEvent, ValidationStateManager};
//!
//! let mut state = ValidationStateManager::cvc_only();
//!
//! // Partial input: nothing to say yet.
//! assert!(state.handle_result(Field::Cvc, false, false).is_empty());
//!
//! let events = state.handle_result(Field::Cvc, true, false);
//! assert_eq!(events, vec![ValidationEvent::CvcValidated(true), ValidationEvent::ValidationSuccess]);
//! ```

use crate::card::CardBrand;

/// A card field the manager tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Card number.
    Pan,
    /// Card security code.
    Cvc,
    /// Expiry date (`MM/YY`).
    ExpiryDate,
}

/// Receives validation changes for the fields of one form.
///
/// All methods default to doing nothing. They are called from whatever
/// thread reported the field event.
pub trait ValidationListener: Send + Sync {
    /// The PAN became valid or invalid.
    fn on_pan_validated(&self, _is_valid: bool) {}

    /// The CVC became valid or invalid.
    fn on_cvc_validated(&self, _is_valid: bool) {}

    /// The expiry date became valid or invalid.
    fn on_expiry_date_validated(&self, _is_valid: bool) {}

    /// The PAN now resolves to a different brand, or to none.
    fn on_brand_change(&self, _brand: Option<&CardBrand>) {}

    /// Every field of the form is valid.
    fn on_validation_success(&self) {}
}

/// A notification for a [`ValidationListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    /// See [`ValidationListener::on_pan_validated`].
    PanValidated(bool),
    /// See [`ValidationListener::on_cvc_validated`].
    CvcValidated(bool),
    /// See [`ValidationListener::on_expiry_date_validated`].
    ExpiryDateValidated(bool),
    /// See [`ValidationListener::on_brand_change`].
    BrandChanged(Option<CardBrand>),
    /// See [`ValidationListener::on_validation_success`].
    ValidationSuccess,
}

impl ValidationEvent {
    fn validated(field: Field, is_valid: bool) -> Self {
        match field {
            Field::Pan => Self::PanValidated(is_valid),
            Field::Cvc => Self::CvcValidated(is_valid),
            Field::ExpiryDate => Self::ExpiryDateValidated(is_valid),
        }
    }

    /// Calls the matching listener method.
    pub fn notify(&self, listener: &dyn ValidationListener) {
        match self {
            Self::PanValidated(valid) => listener.on_pan_validated(*valid),
            Self::CvcValidated(valid) => listener.on_cvc_validated(*valid),
            Self::ExpiryDateValidated(valid) => listener.on_expiry_date_validated(*valid),
            Self::BrandChanged(brand) => listener.on_brand_change(brand.as_ref()),
            Self::ValidationSuccess => listener.on_validation_success(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FieldState {
    last_emitted: Option<bool>,
    current: bool,
}

/// Per-form notification state.
#[derive(Debug, Clone)]
pub struct ValidationStateManager {
    tracked: Vec<Field>,
    pan: FieldState,
    cvc: FieldState,
    expiry_date: FieldState,
    brand: Option<CardBrand>,
}

impl ValidationStateManager {
    /// Tracks the given fields; success needs all of them valid.
    pub fn new(tracked: &[Field]) -> Self {
        let mut fields: Vec<Field> = Vec::with_capacity(tracked.len());
        for field in tracked {
            if !fields.contains(field) {
                fields.push(*field);
            }
        }
        Self {
            tracked: fields,
            pan: FieldState::default(),
            cvc: FieldState::default(),
            expiry_date: FieldState::default(),
            brand: None,
        }
    }

    /// The card form: PAN, expiry date and CVC.
    pub fn card() -> Self {
        Self::new(&[Field::Pan, Field::ExpiryDate, Field::Cvc])
    }

    /// The CVC-only form.
    pub fn cvc_only() -> Self {
        Self::new(&[Field::Cvc])
    }

    /// Fields that count towards success.
    pub fn tracked(&self) -> &[Field] {
        &self.tracked
    }

    /// The brand last reported.
    pub fn brand(&self) -> Option<&CardBrand> {
        self.brand.as_ref()
    }

    /// Last validity reported for `field`, or `None` if never reported.
    pub fn last_emitted(&self, field: Field) -> Option<bool> {
        self.state(field).last_emitted
    }

    /// Validity of the field's current content.
    pub fn is_valid(&self, field: Field) -> bool {
        self.state(field).current
    }

    fn state(&self, field: Field) -> &FieldState {
        match field {
            Field::Pan => &self.pan,
            Field::Cvc => &self.cvc,
            Field::ExpiryDate => &self.expiry_date,
        }
    }

    fn state_mut(&mut self, field: Field) -> &mut FieldState {
        match field {
            Field::Pan => &mut self.pan,
            Field::Cvc => &mut self.cvc,
            Field::ExpiryDate => &mut self.expiry_date,
        }
    }

    /// Records a new validation result for `field`.
    ///
    /// # Arguments
    ///
    /// * `field` - The field that was validated.
    /// * `is_valid` - Whether its content is complete and acceptable.
    /// * `force` - Report an invalid result even if the field has never
    ///   been reported. Set when the input can no longer become valid.
    ///
    /// # Returns
    ///
    /// The events to deliver, possibly none.
    pub fn handle_result(
        &mut self,
        field: Field,
        is_valid: bool,
        force: bool,
    ) -> Vec<ValidationEvent> {
        let state = self.state_mut(field);
        state.current = is_valid;

        let emit = match state.last_emitted {
            Some(previous) => previous != is_valid,
            None => is_valid || force,
        };

        if emit {
            self.emit(field, is_valid)
        } else {
            Vec::new()
        }
    }

    /// Reports the field's current validity if it was never reported.
    pub fn handle_focus_lost(&mut self, field: Field) -> Vec<ValidationEvent> {
        let state = self.state(field);
        match state.last_emitted {
            None => {
                let current = state.current;
                self.emit(field, current)
            }
            Some(_) => Vec::new(),
        }
    }

    /// Records the brand the PAN resolves to.
    ///
    /// Returns the change event when the brand differs from the last one,
    /// including changes to and from no brand.
    pub fn handle_brand(&mut self, brand: Option<&CardBrand>) -> Option<ValidationEvent> {
        let previous = self.brand.as_ref().map(CardBrand::name);
        let next = brand.map(CardBrand::name);
        if previous == next {
            return None;
        }

        self.brand = brand.cloned();
        Some(ValidationEvent::BrandChanged(self.brand.clone()))
    }

    fn emit(&mut self, field: Field, is_valid: bool) -> Vec<ValidationEvent> {
        self.state_mut(field).last_emitted = Some(is_valid);

        let mut events = vec![ValidationEvent::validated(field, is_valid)];
        if self.all_valid() {
            events.push(ValidationEvent::ValidationSuccess);
        }
        events
    }

    fn all_valid(&self) -> bool {
        !self.tracked.is_empty()
            && self
                .tracked
                .iter()
                .all(|field| self.state(*field).last_emitted == Some(true))
    }
}

impl Default for ValidationStateManager {
    fn default() -> Self {
        Self::card()
    }
}
