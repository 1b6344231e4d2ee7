//! Verification Session

use std::{fmt, sync::Arc};

use jiff::{Timestamp, civil::DateTime};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::{Span, info, warn};

use crate::{
    applications::{AppliedDiscount, ApplicationLedger, LedgerError},
    benefits::Selection,
    catalog::Catalog,
    customers::{CustomerLookup, PhoneError, PhoneNumber, resolve_customer},
    ids::{BranchId, DiscountId},
    verification::{
        channels::{ChannelError, OtpChannel, ReferralChannel},
        workflow::{TransitionError, Workflow, WorkflowEvent, WorkflowStatus},
    },
};

/// Session driver errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The phone number could not be normalised.
    #[error(transparent)]
    Phone(#[from] PhoneError),

    /// The workflow rejected the step.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A verification code could not be sent.
    #[error("failed to send verification code")]
    Channel(#[source] ChannelError),

    /// The application could not be recorded. Applying may be retried.
    #[error("failed to record the applied discount")]
    Ledger(#[source] LedgerError),
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    /// Customer profiles.
    pub lookup: Arc<dyn CustomerLookup>,

    /// One-time passwords to the customer.
    pub otp: Arc<dyn OtpChannel>,

    /// Confirmation by the referring customer.
    pub referral: Arc<dyn ReferralChannel>,

    /// Applied discount sink.
    pub ledger: Arc<dyn ApplicationLedger>,
}

impl fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionServices").finish_non_exhaustive()
    }
}

/// One customer-facing verification session.
///
/// Couples a [`Workflow`] with the channels and ledger. Each channel has a
/// single pending-request slot: a second check while one is running is
/// rejected by the workflow, not queued.
#[derive(Debug)]
pub struct VerificationSession<'a> {
    services: SessionServices,
    workflow: Workflow<'a>,
}

impl<'a> VerificationSession<'a> {
    /// Look up the customer behind `phone` and list their eligible discounts.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Phone`] for a malformed phone number. Lookup
    /// failures do not fail the session; the customer is treated as new.
    #[tracing::instrument(
        name = "verification.session.start",
        skip(services, catalog, phone, branch),
        fields(
            branch = %branch,
            phone = tracing::field::Empty,
            eligible = tracing::field::Empty
        ),
        err
    )]
    pub async fn start(
        services: SessionServices,
        catalog: &Catalog<'a>,
        phone: &str,
        branch: BranchId,
        moment: DateTime,
    ) -> Result<Self, SessionError> {
        let phone = PhoneNumber::parse(phone)?;
        let span = Span::current();

        span.record("phone", tracing::field::display(&phone));

        let mut workflow = Workflow::new(phone.clone());

        workflow.transition(WorkflowEvent::PhoneVerified)?;

        let customer = resolve_customer(services.lookup.as_ref(), &phone, branch, moment).await;
        let eligible: Vec<_> = catalog
            .list_eligible(&customer.context)
            .into_iter()
            .cloned()
            .collect();

        span.record("eligible", eligible.len());

        workflow.transition(WorkflowEvent::CustomerResolved { customer, eligible })?;

        Ok(Self { services, workflow })
    }

    /// Underlying workflow, for display.
    pub const fn workflow(&self) -> &Workflow<'a> {
        &self.workflow
    }

    /// Current state.
    pub fn status(&self) -> WorkflowStatus {
        self.workflow.status()
    }

    /// Select a discount from the eligible list.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when the discount is not eligible
    /// or the workflow is past the list.
    pub fn choose_discount(
        &mut self,
        id: DiscountId,
        order_amount: Money<'a, Currency>,
    ) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::DiscountChosen { id, order_amount })
    }

    /// Correct the order total.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when no discount is selected.
    pub fn enter_order_amount(
        &mut self,
        amount: Money<'a, Currency>,
    ) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::OrderAmountEntered(amount))
    }

    /// Pick a bank card or price option.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when the selection does not fit
    /// the selected discount.
    pub fn choose_sub_option(
        &mut self,
        selection: Selection,
    ) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::SubOptionChosen(selection))
    }

    /// Enter the customer's name.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] once the discount is applied.
    pub fn enter_name(&mut self, name: &str) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::NameEntered(name.to_string()))
    }

    /// Choose the serving branch.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when the discount is not offered
    /// at `branch`.
    pub fn choose_branch(&mut self, branch: BranchId) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::BranchChosen(branch))
    }

    /// Go back to the discount list, discarding verification.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] while applying or once applied.
    pub fn cancel(&mut self) -> Result<WorkflowStatus, SessionError> {
        self.step(WorkflowEvent::Cancel)
    }

    fn step(&mut self, event: WorkflowEvent<'a>) -> Result<WorkflowStatus, SessionError> {
        Ok(self.workflow.transition(event)?)
    }

    /// Send a one-time password to the customer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when a code may not be sent now
    /// and [`SessionError::Channel`] when sending fails.
    #[tracing::instrument(
        name = "verification.session.send_otp",
        skip(self),
        fields(phone = %self.workflow.phone()),
        err
    )]
    pub async fn send_otp(&mut self) -> Result<WorkflowStatus, SessionError> {
        self.workflow.check_otp_send()?;

        let token = self
            .services
            .otp
            .send(self.workflow.phone())
            .await
            .map_err(SessionError::Channel)?;

        self.step(WorkflowEvent::OtpSent(token))
    }

    /// Check the code the customer read out.
    ///
    /// A transport failure counts as a wrong code.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when no code was sent or a check
    /// is already running.
    #[tracing::instrument(
        name = "verification.session.submit_otp",
        skip(self, code),
        fields(phone = %self.workflow.phone(), verified = tracing::field::Empty),
        err
    )]
    pub async fn submit_otp(&mut self, code: &str) -> Result<WorkflowStatus, SessionError> {
        self.workflow.transition(WorkflowEvent::OtpSubmitted)?;

        let token = self
            .workflow
            .otp_token()
            .cloned()
            .ok_or(TransitionError::CodeNotSent)?;

        let verified = match self.services.otp.verify(&token, code).await {
            Ok(verified) => verified,
            Err(error) => {
                warn!(%error, "otp check failed; counting as a wrong code");

                false
            }
        };

        Span::current().record("verified", verified);

        self.step(WorkflowEvent::OtpChecked { verified })
    }

    /// Send a confirmation code to the referring customer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Phone`] for a malformed number,
    /// [`SessionError::Transition`] when the discount is not a referral or a
    /// code may not be sent now, and [`SessionError::Channel`] when sending
    /// fails.
    #[tracing::instrument(
        name = "verification.session.send_referrer_code",
        skip(self, phone),
        fields(referrer = tracing::field::Empty),
        err
    )]
    pub async fn send_referrer_code(
        &mut self,
        phone: &str,
    ) -> Result<WorkflowStatus, SessionError> {
        let phone = PhoneNumber::parse(phone)?;

        Span::current().record("referrer", tracing::field::display(&phone));

        self.workflow.check_referrer_send(&phone)?;

        let token = self
            .services
            .referral
            .send(&phone)
            .await
            .map_err(SessionError::Channel)?;

        self.step(WorkflowEvent::ReferrerCodeSent { phone, token })
    }

    /// Check the code the referring customer received.
    ///
    /// A transport failure counts as a wrong code.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when no code was sent or a check
    /// is already running.
    #[tracing::instrument(
        name = "verification.session.submit_referrer_code",
        skip(self, code),
        fields(verified = tracing::field::Empty),
        err
    )]
    pub async fn submit_referrer_code(
        &mut self,
        code: &str,
    ) -> Result<WorkflowStatus, SessionError> {
        self.workflow.transition(WorkflowEvent::ReferrerSubmitted)?;

        let token = self
            .workflow
            .referrer_token()
            .cloned()
            .ok_or(TransitionError::CodeNotSent)?;

        let verified = match self.services.referral.verify(&token, code).await {
            Ok(verified) => verified,
            Err(error) => {
                warn!(%error, "referrer check failed; counting as a wrong code");

                false
            }
        };

        Span::current().record("verified", verified);

        self.step(WorkflowEvent::ReferrerChecked { verified })
    }

    /// Apply the discount and record it in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] when a precondition is unmet or
    /// the discount was already applied, and [`SessionError::Ledger`] when
    /// recording fails, leaving the workflow in
    /// [`WorkflowStatus::ApplyFailed`].
    #[tracing::instrument(
        name = "verification.session.apply",
        skip(self),
        fields(
            phone = %self.workflow.phone(),
            discount_id = tracing::field::Empty,
            discount_minor = tracing::field::Empty
        ),
        err
    )]
    pub async fn apply(&mut self, at: Timestamp) -> Result<AppliedDiscount, SessionError> {
        self.workflow.transition(WorkflowEvent::Apply { at })?;

        let Some(record) = self.workflow.pending_application().cloned() else {
            return Err(TransitionError::NotAllowed {
                event: "apply",
                status: self.workflow.status(),
            }
            .into());
        };

        let span = Span::current();

        span.record("discount_id", tracing::field::display(&record.discount_id));
        span.record("discount_minor", record.discount_minor);

        match self.services.ledger.record(&record).await {
            Ok(()) => {
                self.workflow.transition(WorkflowEvent::ApplySucceeded)?;

                info!(customer = %record.customer_name, "applied discount");

                Ok(record)
            }
            Err(error) => {
                self.workflow.transition(WorkflowEvent::ApplyFailed)?;

                Err(SessionError::Ledger(error))
            }
        }
    }
}
