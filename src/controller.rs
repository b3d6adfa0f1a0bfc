//! Wires host text fields to validation.
//!
//! The host implements [`CardField`] for its PAN, expiry date and CVC
//! inputs and reports text changes and focus loss to a
//! [`CardValidationController`]. The controller rewrites the text
//! (formatting, sanitising, length limits), validates it and passes the
//! resulting changes to a [`ValidationListener`].
//!
//! Field writes and listener calls happen after the controller's lock is
//! released, so a host that reports the controller's own `set_text` back
//! as a text change does not deadlock; the second pass finds nothing left
//! to rewrite.
//!
//! # Example
//!
//! ```
//! use access_checkout::controller::{CardField, CardValidationController};
//! use access_checkout::state::{Field, ValidationListener};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Input(Mutex<String>);
//!
//! impl CardField for Input {
//!     fn text(&self) -> String {
//!         self.0.lock().unwrap().clone()
//!     }
//!     fn set_text(&self, text: &str) {
//!         *self.0.lock().unwrap() = text.to_string();
//!     }
//!     fn set_max_length(&self, _max: usize) {}
//! }
//!
//! struct Quiet;
//! impl ValidationListener for Quiet {}
//!
//! let cvc = Arc::new(Input::default());
//! let controller = CardValidationController::builder()
//!     .cvc(cvc.clone())
//!     .listener(Arc::new(Quiet))
//!     .build()
//!     .unwrap();
//!
//! cvc.set_text("12a3");
//! controller.on_text_changed(Field::Cvc);
//! assert_eq!(cvc.text(), "123");
//! ```

use crate::card::{CardBrand, CardConfiguration};
use crate::config::CardConfigurationProvider;
use crate::cvc::validate_cvc_for_brand;
use crate::detect::find_brand;
use crate::error::AccessCheckoutError;
use crate::expiry::{self, DEFAULT_MAX_YEARS_AHEAD};
use crate::format::{format_pan, strip_formatting};
use crate::length::{clamp, cvc_max_length_for_brand, expiry_max_length, pan_max_length_for_brand};
use crate::mask::mask_pan;
use crate::state::{Field, ValidationEvent, ValidationListener, ValidationStateManager};
use crate::validate::check_pan;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

/// A host text input.
pub trait CardField: Send + Sync {
    /// Current text.
    fn text(&self) -> String;

    /// Replaces the text.
    fn set_text(&self, text: &str);

    /// Limits how many characters the input accepts.
    fn set_max_length(&self, max: usize);
}

/// Source of the current time for expiry checks.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

enum Effect {
    SetText(Arc<dyn CardField>, String),
    SetMaxLength(Arc<dyn CardField>, usize),
}

/// Work to do once the lock is released.
#[derive(Default)]
struct Outcome {
    effects: Vec<Effect>,
    events: Vec<ValidationEvent>,
}

struct Fields {
    pan: Option<Arc<dyn CardField>>,
    expiry_date: Option<Arc<dyn CardField>>,
    cvc: Arc<dyn CardField>,
}

struct Inner {
    config: Arc<CardConfiguration>,
    accepted_brands: Vec<String>,
    pan_formatting: bool,
    max_years_ahead: u32,
    brand: Option<CardBrand>,
    last_expiry_date: String,
    state: ValidationStateManager,
}

struct Shared {
    fields: Fields,
    listener: Arc<dyn ValidationListener>,
    clock: Clock,
    inner: Mutex<Inner>,
}

/// Validates a card form (PAN, expiry date, CVC) or a CVC-only form.
///
/// Cheap to clone; clones drive the same form.
#[derive(Clone)]
pub struct CardValidationController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CardValidationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CardValidationController")
            .field("brand", &inner.brand.as_ref().map(CardBrand::name))
            .field("accepted_brands", &inner.accepted_brands)
            .field("pan_formatting", &inner.pan_formatting)
            .finish_non_exhaustive()
    }
}

impl CardValidationController {
    /// Starts building a controller.
    pub fn builder() -> CardValidationControllerBuilder {
        CardValidationControllerBuilder::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Brand the PAN currently resolves to.
    pub fn brand(&self) -> Option<CardBrand> {
        self.lock().brand.clone()
    }

    /// Configuration in use.
    pub fn configuration(&self) -> Arc<CardConfiguration> {
        Arc::clone(&self.lock().config)
    }

    /// Handles a text change in `field`.
    ///
    /// Changes for a field the form does not have are ignored.
    pub fn on_text_changed(&self, field: Field) {
        let outcome = {
            let mut inner = self.lock();
            match field {
                Field::Pan => match &self.shared.fields.pan {
                    Some(pan) => inner.pan_changed(pan, &self.shared.fields),
                    None => Outcome::default(),
                },
                Field::ExpiryDate => match &self.shared.fields.expiry_date {
                    Some(expiry_date) => inner.expiry_date_changed(expiry_date, &self.shared.clock),
                    None => Outcome::default(),
                },
                Field::Cvc => inner.cvc_changed(&self.shared.fields.cvc),
            }
        };

        self.apply(outcome);
    }

    /// Handles `field` losing focus.
    pub fn on_focus_lost(&self, field: Field) {
        let events = self.lock().state.handle_focus_lost(field);
        self.apply(Outcome {
            effects: Vec::new(),
            events,
        });
    }

    /// Swaps in a new configuration.
    ///
    /// Length limits are re-applied and every non-empty field is
    /// validated again under the new rules.
    pub fn apply_configuration(&self, config: Arc<CardConfiguration>) {
        let outcome = {
            let mut inner = self.lock();
            inner.config = config;

            let fields = &self.shared.fields;
            let mut outcome = Outcome::default();

            if let Some(pan) = &fields.pan {
                if pan.text().is_empty() {
                    outcome.effects.push(Effect::SetMaxLength(
                        Arc::clone(pan),
                        pan_max_length_for_brand(None, &inner.config, inner.pan_formatting),
                    ));
                } else {
                    outcome.extend(inner.pan_changed(pan, fields));
                }
            }

            outcome.effects.push(Effect::SetMaxLength(
                Arc::clone(&fields.cvc),
                cvc_max_length_for_brand(inner.brand.as_ref(), &inner.config),
            ));
            if !fields.cvc.text().is_empty() {
                outcome.extend(inner.revalidate_cvc(&fields.cvc));
            }

            if let Some(expiry_date) = &fields.expiry_date {
                outcome.effects.push(Effect::SetMaxLength(
                    Arc::clone(expiry_date),
                    expiry_max_length(&inner.config),
                ));
                if !expiry_date.text().is_empty() {
                    outcome.extend(inner.expiry_date_changed(expiry_date, &self.shared.clock));
                }
            }
            outcome
        };

        self.apply(outcome);
    }

    /// Follows configuration swaps made by `provider`.
    ///
    /// The subscription does not keep the controller alive.
    pub fn observe(&self, provider: &CardConfigurationProvider) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        provider.subscribe(move |config| {
            if let Some(shared) = weak.upgrade() {
                CardValidationController { shared }.apply_configuration(Arc::clone(config));
            }
        });

        let current = provider.current();
        if current != self.configuration() {
            self.apply_configuration(current);
        }
    }

    fn apply(&self, outcome: Outcome) {
        for effect in outcome.effects {
            match effect {
                Effect::SetText(field, text) => field.set_text(&text),
                Effect::SetMaxLength(field, max) => field.set_max_length(max),
            }
        }

        let listener = self.shared.listener.as_ref();
        for event in &outcome.events {
            event.notify(listener);
        }
    }
}

impl Outcome {
    fn extend(&mut self, other: Outcome) {
        self.effects.extend(other.effects);
        self.events.extend(other.events);
    }
}

impl Inner {
    fn pan_changed(&mut self, pan: &Arc<dyn CardField>, fields: &Fields) -> Outcome {
        let mut outcome = Outcome::default();
        let text = pan.text();

        let mut digits = strip_formatting(&text);
        let mut brand = find_brand(&digits, self.config.brands()).cloned();
        let max_digits = pan_max_length_for_brand(brand.as_ref(), &self.config, false);
        if let Some(clamped) = clamp(&digits, max_digits) {
            digits = clamped;
            brand = find_brand(&digits, self.config.brands()).cloned();
        }

        let rewritten = if self.pan_formatting {
            format_pan(&digits, brand.as_ref())
        } else {
            digits.clone()
        };
        if rewritten != text {
            outcome
                .effects
                .push(Effect::SetText(Arc::clone(pan), rewritten));
        }

        outcome.extend(self.brand_changed(brand.as_ref(), fields));
        outcome.effects.push(Effect::SetMaxLength(
            Arc::clone(pan),
            pan_max_length_for_brand(brand.as_ref(), &self.config, self.pan_formatting),
        ));

        let check = check_pan(&digits, &self.config, &self.accepted_brands);
        let is_valid = check.is_valid();
        let force = check.result.is_unmatchable() || !check.brand_accepted;

        debug!(pan = %mask_pan(&digits), is_valid, "pan validated");
        outcome
            .events
            .extend(self.state.handle_result(Field::Pan, is_valid, force));
        outcome
    }

    fn brand_changed(&mut self, brand: Option<&CardBrand>, fields: &Fields) -> Outcome {
        let mut outcome = Outcome::default();
        let changed = self.state.handle_brand(brand);
        self.brand = brand.cloned();

        outcome.effects.push(Effect::SetMaxLength(
            Arc::clone(&fields.cvc),
            cvc_max_length_for_brand(brand, &self.config),
        ));

        if let Some(event) = changed {
            debug!(brand = brand.map(CardBrand::name), "brand changed");
            outcome.events.push(event);

            if !fields.cvc.text().is_empty() {
                outcome.extend(self.revalidate_cvc(&fields.cvc));
            }
        }
        outcome
    }

    fn cvc_changed(&mut self, cvc: &Arc<dyn CardField>) -> Outcome {
        let mut outcome = Outcome::default();
        let text = cvc.text();

        let mut digits = strip_formatting(&text);
        let max_length = cvc_max_length_for_brand(self.brand.as_ref(), &self.config);
        if let Some(clamped) = clamp(&digits, max_length) {
            digits = clamped;
        }
        if digits != text {
            outcome.effects.push(Effect::SetText(Arc::clone(cvc), digits.clone()));
        }

        outcome.events.extend(self.cvc_validated(&digits));
        outcome
    }

    /// Validates the CVC as it stands, without rewriting it. A CVC that
    /// was fine for the old brand may now be too long.
    fn revalidate_cvc(&mut self, cvc: &Arc<dyn CardField>) -> Outcome {
        Outcome {
            effects: Vec::new(),
            events: self.cvc_validated(&cvc.text()),
        }
    }

    fn cvc_validated(&mut self, cvc: &str) -> Vec<ValidationEvent> {
        let result = validate_cvc_for_brand(cvc, self.brand.as_ref(), &self.config);
        self.state
            .handle_result(Field::Cvc, result.complete, result.is_unmatchable())
    }

    fn expiry_date_changed(&mut self, expiry_date: &Arc<dyn CardField>, clock: &Clock) -> Outcome {
        let mut outcome = Outcome::default();
        let text = expiry_date.text();

        // Deleting characters must not re-insert the separator the user
        // just removed.
        let deleting = text.len() < self.last_expiry_date.len()
            && self.last_expiry_date.starts_with(text.as_str());
        let mut rewritten = if deleting {
            text.clone()
        } else {
            expiry::sanitise_expiry_date(&text)
        };
        if let Some(clamped) = clamp(&rewritten, expiry_max_length(&self.config)) {
            rewritten = clamped;
        }
        if rewritten != text {
            outcome
                .effects
                .push(Effect::SetText(Arc::clone(expiry_date), rewritten.clone()));
        }

        let (month, year) = expiry::split_expiry_date(&rewritten);
        let result = expiry::validate_expiry_with_options(
            month,
            year,
            &self.config,
            &clock(),
            Some(self.max_years_ahead),
        );
        self.last_expiry_date = rewritten;

        outcome.events.extend(self.state.handle_result(
            Field::ExpiryDate,
            result.complete,
            result.is_unmatchable(),
        ));
        outcome
    }
}

/// Builder for [`CardValidationController`].
///
/// A card form needs PAN, expiry date and CVC fields; a CVC-only form
/// needs just the CVC field. A listener is always required.
#[derive(Default)]
pub struct CardValidationControllerBuilder {
    pan: Option<Arc<dyn CardField>>,
    expiry_date: Option<Arc<dyn CardField>>,
    cvc: Option<Arc<dyn CardField>>,
    listener: Option<Arc<dyn ValidationListener>>,
    accepted_brands: Vec<String>,
    pan_formatting: bool,
    config: Option<Arc<CardConfiguration>>,
    clock: Option<Clock>,
    max_years_ahead: Option<u32>,
}

impl CardValidationControllerBuilder {
    /// PAN field.
    pub fn pan(mut self, field: Arc<dyn CardField>) -> Self {
        self.pan = Some(field);
        self
    }

    /// Expiry date field.
    pub fn expiry_date(mut self, field: Arc<dyn CardField>) -> Self {
        self.expiry_date = Some(field);
        self
    }

    /// CVC field.
    pub fn cvc(mut self, field: Arc<dyn CardField>) -> Self {
        self.cvc = Some(field);
        self
    }

    /// Receives validation changes.
    pub fn listener(mut self, listener: Arc<dyn ValidationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Brands the merchant takes. Empty (the default) takes all.
    pub fn accepted_brands<I, S>(mut self, brands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_brands = brands.into_iter().map(Into::into).collect();
        self
    }

    /// Groups PAN digits as they are typed.
    pub fn enable_pan_formatting(mut self) -> Self {
        self.pan_formatting = true;
        self
    }

    /// Rules to start with. Defaults to [`CardConfiguration::default`].
    pub fn configuration(mut self, config: Arc<CardConfiguration>) -> Self {
        self.config = Some(config);
        self
    }

    /// Clock for expiry checks. Defaults to the local time.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Expiry dates further ahead than this are invalid.
    pub fn max_years_ahead(mut self, years: u32) -> Self {
        self.max_years_ahead = Some(years);
        self
    }

    /// Builds the controller and applies the initial length limits.
    ///
    /// # Errors
    ///
    /// [`AccessCheckoutError::IllegalArgument`] when the CVC field or the
    /// listener is missing, or when only one of PAN and expiry date is set.
    pub fn build(self) -> Result<CardValidationController, AccessCheckoutError> {
        let cvc = self.cvc.ok_or_else(|| {
            AccessCheckoutError::illegal_argument(
                "Expected cvc component to be provided but was not",
            )
        })?;
        let listener = self.listener.ok_or_else(|| {
            AccessCheckoutError::illegal_argument(
                "Expected validation listener to be provided but was not",
            )
        })?;
        if self.pan.is_some() != self.expiry_date.is_some() {
            return Err(AccessCheckoutError::illegal_argument(
                "Expected both pan and expiry date components to be provided, or neither",
            ));
        }

        let state = if self.pan.is_some() {
            ValidationStateManager::card()
        } else {
            ValidationStateManager::cvc_only()
        };

        let controller = CardValidationController {
            shared: Arc::new(Shared {
                fields: Fields {
                    pan: self.pan,
                    expiry_date: self.expiry_date,
                    cvc,
                },
                listener,
                clock: self.clock.unwrap_or_else(|| Arc::new(Local::now) as Clock),
                inner: Mutex::new(Inner {
                    config: Arc::new(CardConfiguration::default()),
                    accepted_brands: self.accepted_brands,
                    pan_formatting: self.pan_formatting,
                    max_years_ahead: self.max_years_ahead.unwrap_or(DEFAULT_MAX_YEARS_AHEAD),
                    brand: None,
                    last_expiry_date: String::new(),
                    state,
                }),
            }),
        };

        controller.apply_configuration(self.config.unwrap_or_default());
        Ok(controller)
    }
}
