//! Verification Workflow
//!
//! Event-driven state machine for one customer lookup, from the phone number
//! being entered to the discount being applied. Every combination of
//! verification flags the staff UI could reach is a named state here, and a
//! rejected event never changes the state.
//!
//! The workflow is synchronous and does no I/O. Channel and ledger outcomes
//! are fed back in as events by the session driver.

use std::fmt;

use jiff::Timestamp;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::{
    applications::{Application, AppliedDiscount},
    benefits::{BenefitResult, CalculationError, Selection, VerifiedReferrer, calculate},
    customers::{PhoneNumber, ResolvedCustomer},
    discounts::{Discount, DiscountKind},
    eligibility::{self, EvaluationContext},
    ids::{BranchId, DiscountId},
    verification::channels::SessionToken,
};

/// Named state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    /// Phone number entered, customer not yet looked up.
    PhoneEntered,

    /// Looking up the customer and their eligible discounts.
    Verifying,

    /// Nothing applies to this customer right now.
    NoDiscounts,

    /// Eligible discounts are listed.
    DiscountList,

    /// A discount is selected and no code has been sent.
    DiscountSelected,

    /// A code was sent or is being checked.
    AwaitingOtp,

    /// The customer is verified but something else blocks applying.
    OtpVerified,

    /// The last code was wrong; submit again or resend.
    OtpFailed,

    /// Every precondition for applying holds.
    ReadyToApply,

    /// The application is being recorded.
    Applying,

    /// Recording failed; applying may be retried.
    ApplyFailed,

    /// The discount was applied. Terminal.
    Applied,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PhoneEntered => "phone entered",
            Self::Verifying => "verifying",
            Self::NoDiscounts => "no discounts",
            Self::DiscountList => "discount list",
            Self::DiscountSelected => "discount selected",
            Self::AwaitingOtp => "awaiting otp",
            Self::OtpVerified => "otp verified",
            Self::OtpFailed => "otp failed",
            Self::ReadyToApply => "ready to apply",
            Self::Applying => "applying",
            Self::ApplyFailed => "apply failed",
            Self::Applied => "applied",
        };

        f.write_str(name)
    }
}

/// State of the referring-customer verification for referral discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferrerStatus {
    /// No code sent yet.
    Unverified,

    /// Code sent or being checked.
    Verifying,

    /// The referring customer confirmed.
    Verified,

    /// The last code was wrong; submit again or resend.
    Failed,
}

/// Input to the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent<'a> {
    /// The phone number was accepted and the lookup started.
    PhoneVerified,

    /// The customer lookup finished.
    CustomerResolved {
        /// Resolved customer.
        customer: ResolvedCustomer,

        /// Discounts eligible for the customer, in catalog order.
        eligible: Vec<Discount<'a>>,
    },

    /// Staff picked a discount from the list.
    DiscountChosen {
        /// Chosen discount.
        id: DiscountId,

        /// Order total before the discount.
        order_amount: Money<'a, Currency>,
    },

    /// Staff corrected the order total.
    OrderAmountEntered(Money<'a, Currency>),

    /// Staff picked a bank card or price option.
    SubOptionChosen(Selection),

    /// A one-time password was sent to the customer.
    OtpSent(SessionToken),

    /// The customer's code was submitted for checking.
    OtpSubmitted,

    /// The code check finished.
    OtpChecked {
        /// Whether the code matched.
        verified: bool,
    },

    /// A confirmation code was sent to the referring customer.
    ReferrerCodeSent {
        /// Referring customer's phone.
        phone: PhoneNumber,

        /// Channel token for the code.
        token: SessionToken,
    },

    /// The referring customer's code was submitted for checking.
    ReferrerSubmitted,

    /// The referrer code check finished.
    ReferrerChecked {
        /// Whether the code matched.
        verified: bool,
    },

    /// Staff entered the customer's name.
    NameEntered(String),

    /// Staff chose the serving branch.
    BranchChosen(BranchId),

    /// Staff asked to apply the discount.
    Apply {
        /// Time of application.
        at: Timestamp,
    },

    /// The application was recorded.
    ApplySucceeded,

    /// Recording the application failed.
    ApplyFailed,

    /// Staff went back to the discount list.
    Cancel,
}

impl WorkflowEvent<'_> {
    /// Event name, for logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PhoneVerified => "phone verified",
            Self::CustomerResolved { .. } => "customer resolved",
            Self::DiscountChosen { .. } => "discount chosen",
            Self::OrderAmountEntered(_) => "order amount entered",
            Self::SubOptionChosen(_) => "sub-option chosen",
            Self::OtpSent(_) => "otp sent",
            Self::OtpSubmitted => "otp submitted",
            Self::OtpChecked { .. } => "otp checked",
            Self::ReferrerCodeSent { .. } => "referrer code sent",
            Self::ReferrerSubmitted => "referrer submitted",
            Self::ReferrerChecked { .. } => "referrer checked",
            Self::NameEntered(_) => "name entered",
            Self::BranchChosen(_) => "branch chosen",
            Self::Apply { .. } => "apply",
            Self::ApplySucceeded => "apply succeeded",
            Self::ApplyFailed => "apply failed",
            Self::Cancel => "cancel",
        }
    }
}

/// Rejected workflow event. The workflow state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event makes no sense in the current state.
    #[error("cannot handle {event} while the workflow is {status}")]
    NotAllowed {
        /// Rejected event.
        event: &'static str,
        /// Current state.
        status: WorkflowStatus,
    },

    /// The chosen discount is not in the customer's eligible list.
    #[error("discount {0} is not available to this customer right now")]
    NotEligible(DiscountId),

    /// The discount does not take a card or price option.
    #[error("this discount does not need a card or price option")]
    NoSubSelection,

    /// The sub-selection does not fit the discount kind.
    #[error("choose a {expected} for this discount")]
    WrongSubSelection {
        /// What the discount needs.
        expected: &'static str,
    },

    /// Referrer verification on a discount that is not a referral.
    #[error("only referral discounts need the referring customer verified")]
    NotReferral,

    /// The customer named themselves as referrer.
    #[error("the referring customer must be someone other than the customer")]
    SelfReferral,

    /// A code was submitted before one was sent.
    #[error("send a verification code before submitting one")]
    CodeNotSent,

    /// A check is already running on this channel.
    #[error("a verification check is already in progress; wait for its result")]
    VerificationPending,

    /// The channel is already verified.
    #[error("this verification has already succeeded")]
    AlreadyVerified,

    /// The discount is not offered at the chosen branch.
    #[error("this discount is not offered at branch {0}")]
    BranchNotOffered(BranchId),

    /// Applying without a verified customer.
    #[error("verify the customer's one-time password before applying")]
    OtpNotVerified,

    /// Applying a referral without a verified referrer.
    #[error("verify the referring customer before applying")]
    ReferrerNotVerified,

    /// Applying without a customer name.
    #[error("enter the customer's name before applying")]
    MissingCustomerName,

    /// Applying without a branch.
    #[error("choose the serving branch before applying")]
    MissingBranch,

    /// Applying while the benefit cannot be calculated.
    #[error(transparent)]
    Calculation(CalculationError),

    /// An application is already being recorded.
    #[error("the discount is already being applied")]
    ApplyPending,

    /// The discount was already applied in this session.
    #[error("the discount has already been applied for this customer")]
    AlreadyApplied,
}

#[derive(Debug, Clone, Copy)]
struct Attempt {
    event: &'static str,
    status: WorkflowStatus,
}

impl Attempt {
    const fn rejected(self) -> TransitionError {
        TransitionError::NotAllowed {
            event: self.event,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OtpState {
    NotSent,
    Sent(SessionToken),
    Checking(SessionToken),
    Verified,
    Failed(SessionToken),
}

#[derive(Debug, Clone, PartialEq)]
enum ReferrerState {
    Unverified,
    CodeSent {
        phone: PhoneNumber,
        token: SessionToken,
    },
    Checking {
        phone: PhoneNumber,
        token: SessionToken,
    },
    Verified,
    Failed {
        phone: PhoneNumber,
        token: SessionToken,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum ApplyState {
    Idle,
    Applying(AppliedDiscount),
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
struct SelectedDiscount<'a> {
    discount: Discount<'a>,
    context: EvaluationContext,
    order_amount: Money<'a, Currency>,
    selection: Option<Selection>,
    branch: Option<BranchId>,
    otp: OtpState,
    otp_failures: u32,
    referrer: Option<ReferrerState>,
    referrer_failures: u32,
    apply: ApplyState,
    apply_failures: u32,
    benefit: Result<BenefitResult<'a>, CalculationError>,
}

impl<'a> SelectedDiscount<'a> {
    fn new(
        discount: Discount<'a>,
        context: EvaluationContext,
        order_amount: Money<'a, Currency>,
    ) -> Self {
        let referrer = discount
            .kind()
            .is_referral()
            .then_some(ReferrerState::Unverified);

        let benefit = calculate(&discount, order_amount, &context, None);

        Self {
            discount,
            context,
            order_amount,
            selection: None,
            branch: None,
            otp: OtpState::NotSent,
            otp_failures: 0,
            referrer,
            referrer_failures: 0,
            apply: ApplyState::Idle,
            apply_failures: 0,
            benefit,
        }
    }

    fn recalculate(&mut self) {
        self.benefit = calculate(
            &self.discount,
            self.order_amount,
            &self.context,
            self.selection.as_ref(),
        );
    }

    fn check_apply(&self, customer_name: &str) -> Result<(), TransitionError> {
        if self.otp != OtpState::Verified {
            return Err(TransitionError::OtpNotVerified);
        }

        if let Some(referrer) = &self.referrer
            && *referrer != ReferrerState::Verified
        {
            return Err(TransitionError::ReferrerNotVerified);
        }

        if customer_name.is_empty() {
            return Err(TransitionError::MissingCustomerName);
        }

        if self.branch.is_none() {
            return Err(TransitionError::MissingBranch);
        }

        if let Err(error) = &self.benefit {
            return Err(TransitionError::Calculation(error.clone()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Stage<'a> {
    PhoneEntered,
    Verifying,
    NoDiscounts,
    DiscountList,
    Selected(Box<SelectedDiscount<'a>>),
    Applied(Box<AppliedDiscount>),
}

impl<'a> Stage<'a> {
    fn selected(&self, attempt: Attempt) -> Result<&SelectedDiscount<'a>, TransitionError> {
        match self {
            Self::Selected(selected) if matches!(selected.apply, ApplyState::Applying(_)) => {
                Err(TransitionError::ApplyPending)
            }
            Self::Selected(selected) => Ok(selected.as_ref()),
            Self::Applied(_) => Err(TransitionError::AlreadyApplied),
            _ => Err(attempt.rejected()),
        }
    }

    fn selected_mut(
        &mut self,
        attempt: Attempt,
    ) -> Result<&mut SelectedDiscount<'a>, TransitionError> {
        match self {
            Self::Selected(selected) if matches!(selected.apply, ApplyState::Applying(_)) => {
                Err(TransitionError::ApplyPending)
            }
            Self::Selected(selected) => Ok(selected.as_mut()),
            Self::Applied(_) => Err(TransitionError::AlreadyApplied),
            _ => Err(attempt.rejected()),
        }
    }
}

/// Verification workflow for one customer lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow<'a> {
    phone: PhoneNumber,
    customer: Option<ResolvedCustomer>,
    customer_name: String,
    eligible: Vec<Discount<'a>>,
    stage: Stage<'a>,
}

impl<'a> Workflow<'a> {
    /// Start a workflow for a normalised phone number.
    pub fn new(phone: PhoneNumber) -> Self {
        Self {
            phone,
            customer: None,
            customer_name: String::new(),
            eligible: Vec::new(),
            stage: Stage::PhoneEntered,
        }
    }

    /// Current state.
    pub fn status(&self) -> WorkflowStatus {
        match &self.stage {
            Stage::PhoneEntered => WorkflowStatus::PhoneEntered,
            Stage::Verifying => WorkflowStatus::Verifying,
            Stage::NoDiscounts => WorkflowStatus::NoDiscounts,
            Stage::DiscountList => WorkflowStatus::DiscountList,
            Stage::Selected(selected) => match (&selected.apply, &selected.otp) {
                (ApplyState::Applying(_), _) => WorkflowStatus::Applying,
                (ApplyState::Failed, _) => WorkflowStatus::ApplyFailed,
                (ApplyState::Idle, OtpState::NotSent) => WorkflowStatus::DiscountSelected,
                (ApplyState::Idle, OtpState::Sent(_) | OtpState::Checking(_)) => {
                    WorkflowStatus::AwaitingOtp
                }
                (ApplyState::Idle, OtpState::Failed(_)) => WorkflowStatus::OtpFailed,
                (ApplyState::Idle, OtpState::Verified) => {
                    if selected.check_apply(&self.customer_name).is_ok() {
                        WorkflowStatus::ReadyToApply
                    } else {
                        WorkflowStatus::OtpVerified
                    }
                }
            },
            Stage::Applied(_) => WorkflowStatus::Applied,
        }
    }

    /// Customer phone number.
    pub const fn phone(&self) -> &PhoneNumber {
        &self.phone
    }

    /// Resolved customer, once the lookup has finished.
    pub const fn customer(&self) -> Option<&ResolvedCustomer> {
        self.customer.as_ref()
    }

    /// Customer name as entered, prefilled from the profile.
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    /// Discounts eligible for the customer.
    pub fn eligible(&self) -> &[Discount<'a>] {
        &self.eligible
    }

    fn selected_ref(&self) -> Option<&SelectedDiscount<'a>> {
        match &self.stage {
            Stage::Selected(selected) => Some(selected.as_ref()),
            _ => None,
        }
    }

    /// Discount being verified.
    pub fn selected_discount(&self) -> Option<&Discount<'a>> {
        self.selected_ref().map(|selected| &selected.discount)
    }

    /// Sub-selection for the selected discount.
    pub fn selection(&self) -> Option<&Selection> {
        self.selected_ref()
            .and_then(|selected| selected.selection.as_ref())
    }

    /// Chosen branch.
    pub fn branch(&self) -> Option<&BranchId> {
        self.selected_ref()
            .and_then(|selected| selected.branch.as_ref())
    }

    /// Current benefit of the selected discount.
    pub fn benefit(&self) -> Option<&Result<BenefitResult<'a>, CalculationError>> {
        self.selected_ref().map(|selected| &selected.benefit)
    }

    /// Token of the last one-time password sent, while it is still usable.
    pub fn otp_token(&self) -> Option<&SessionToken> {
        match &self.selected_ref()?.otp {
            OtpState::Sent(token) | OtpState::Checking(token) | OtpState::Failed(token) => {
                Some(token)
            }
            OtpState::NotSent | OtpState::Verified => None,
        }
    }

    /// Wrong one-time passwords submitted for the selected discount.
    pub fn otp_failures(&self) -> u32 {
        self.selected_ref()
            .map_or(0, |selected| selected.otp_failures)
    }

    /// Referrer verification state, for referral discounts.
    pub fn referrer_status(&self) -> Option<ReferrerStatus> {
        let status = match self.selected_ref()?.referrer.as_ref()? {
            ReferrerState::Unverified => ReferrerStatus::Unverified,
            ReferrerState::CodeSent { .. } | ReferrerState::Checking { .. } => {
                ReferrerStatus::Verifying
            }
            ReferrerState::Verified => ReferrerStatus::Verified,
            ReferrerState::Failed { .. } => ReferrerStatus::Failed,
        };

        Some(status)
    }

    /// Token of the last referrer code sent, while it is still usable.
    pub fn referrer_token(&self) -> Option<&SessionToken> {
        match self.selected_ref()?.referrer.as_ref()? {
            ReferrerState::CodeSent { token, .. }
            | ReferrerState::Checking { token, .. }
            | ReferrerState::Failed { token, .. } => Some(token),
            ReferrerState::Unverified | ReferrerState::Verified => None,
        }
    }

    /// Wrong referrer codes submitted for the selected discount.
    pub fn referrer_failures(&self) -> u32 {
        self.selected_ref()
            .map_or(0, |selected| selected.referrer_failures)
    }

    /// Failed attempts to record the application.
    pub fn apply_failures(&self) -> u32 {
        self.selected_ref()
            .map_or(0, |selected| selected.apply_failures)
    }

    /// Record being written, while applying.
    pub fn pending_application(&self) -> Option<&AppliedDiscount> {
        match &self.selected_ref()?.apply {
            ApplyState::Applying(record) => Some(record),
            ApplyState::Idle | ApplyState::Failed => None,
        }
    }

    /// Recorded application, once applied.
    pub fn applied(&self) -> Option<&AppliedDiscount> {
        match &self.stage {
            Stage::Applied(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Whether a one-time password may be sent now.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] an [`WorkflowEvent::OtpSent`] would be
    /// rejected with.
    pub fn check_otp_send(&self) -> Result<(), TransitionError> {
        let attempt = self.attempt("otp sent");

        match self.stage.selected(attempt)?.otp {
            OtpState::Checking(_) => Err(TransitionError::VerificationPending),
            OtpState::Verified => Err(TransitionError::AlreadyVerified),
            OtpState::NotSent | OtpState::Sent(_) | OtpState::Failed(_) => Ok(()),
        }
    }

    /// Whether a referrer code may be sent to `phone` now.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] a [`WorkflowEvent::ReferrerCodeSent`]
    /// would be rejected with.
    pub fn check_referrer_send(&self, phone: &PhoneNumber) -> Result<(), TransitionError> {
        let attempt = self.attempt("referrer code sent");
        let selected = self.stage.selected(attempt)?;

        if *phone == self.phone {
            return Err(TransitionError::SelfReferral);
        }

        match selected.referrer.as_ref().ok_or(TransitionError::NotReferral)? {
            ReferrerState::Checking { .. } => Err(TransitionError::VerificationPending),
            ReferrerState::Verified => Err(TransitionError::AlreadyVerified),
            ReferrerState::Unverified
            | ReferrerState::CodeSent { .. }
            | ReferrerState::Failed { .. } => Ok(()),
        }
    }

    /// Whether the discount may be applied now.
    ///
    /// # Errors
    ///
    /// Returns the first unmet precondition.
    pub fn check_apply(&self) -> Result<(), TransitionError> {
        self.stage
            .selected(self.attempt("apply"))?
            .check_apply(&self.customer_name)
    }

    fn attempt(&self, event: &'static str) -> Attempt {
        Attempt {
            event,
            status: self.status(),
        }
    }

    /// Feed an event into the workflow.
    ///
    /// # Errors
    ///
    /// Returns a [`TransitionError`] when the event is not allowed in the
    /// current state or its guard fails. The state is then unchanged.
    pub fn transition(
        &mut self,
        event: WorkflowEvent<'a>,
    ) -> Result<WorkflowStatus, TransitionError> {
        let attempt = self.attempt(event.name());

        let result = match event {
            WorkflowEvent::PhoneVerified => self.on_phone_verified(attempt),
            WorkflowEvent::CustomerResolved { customer, eligible } => {
                self.on_customer_resolved(attempt, customer, eligible)
            }
            WorkflowEvent::DiscountChosen { id, order_amount } => {
                self.on_discount_chosen(attempt, &id, order_amount)
            }
            WorkflowEvent::OrderAmountEntered(amount) => {
                self.on_order_amount_entered(attempt, amount)
            }
            WorkflowEvent::SubOptionChosen(selection) => {
                self.on_sub_option_chosen(attempt, selection)
            }
            WorkflowEvent::OtpSent(token) => self.on_otp_sent(attempt, token),
            WorkflowEvent::OtpSubmitted => self.on_otp_submitted(attempt),
            WorkflowEvent::OtpChecked { verified } => self.on_otp_checked(attempt, verified),
            WorkflowEvent::ReferrerCodeSent { phone, token } => {
                self.on_referrer_code_sent(attempt, phone, token)
            }
            WorkflowEvent::ReferrerSubmitted => self.on_referrer_submitted(attempt),
            WorkflowEvent::ReferrerChecked { verified } => {
                self.on_referrer_checked(attempt, verified)
            }
            WorkflowEvent::NameEntered(name) => self.on_name_entered(attempt, &name),
            WorkflowEvent::BranchChosen(branch) => self.on_branch_chosen(attempt, branch),
            WorkflowEvent::Apply { at } => self.on_apply(attempt, at),
            WorkflowEvent::ApplySucceeded => self.on_apply_succeeded(attempt),
            WorkflowEvent::ApplyFailed => self.on_apply_failed(attempt),
            WorkflowEvent::Cancel => self.on_cancel(attempt),
        };

        match result {
            Ok(()) => {
                let status = self.status();

                debug!(
                    event = attempt.event,
                    from = %attempt.status,
                    to = %status,
                    "workflow transition"
                );

                Ok(status)
            }
            Err(error) => {
                debug!(
                    event = attempt.event,
                    status = %attempt.status,
                    %error,
                    "workflow event rejected"
                );

                Err(error)
            }
        }
    }

    fn on_phone_verified(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        if self.stage != Stage::PhoneEntered {
            return Err(attempt.rejected());
        }

        self.stage = Stage::Verifying;

        Ok(())
    }

    fn on_customer_resolved(
        &mut self,
        attempt: Attempt,
        customer: ResolvedCustomer,
        mut eligible: Vec<Discount<'a>>,
    ) -> Result<(), TransitionError> {
        if self.stage != Stage::Verifying {
            return Err(attempt.rejected());
        }

        eligible.retain(|discount| eligibility::is_eligible(discount, &customer.context));

        self.customer_name = customer.display_name.clone().unwrap_or_default();
        self.stage = if eligible.is_empty() {
            Stage::NoDiscounts
        } else {
            Stage::DiscountList
        };
        self.eligible = eligible;
        self.customer = Some(customer);

        Ok(())
    }

    fn on_discount_chosen(
        &mut self,
        attempt: Attempt,
        id: &DiscountId,
        order_amount: Money<'a, Currency>,
    ) -> Result<(), TransitionError> {
        let (Stage::DiscountList, Some(customer)) = (&self.stage, &self.customer) else {
            return Err(attempt.rejected());
        };

        let discount = self
            .eligible
            .iter()
            .find(|discount| discount.id() == id)
            .ok_or_else(|| TransitionError::NotEligible(id.clone()))?;

        let selected =
            SelectedDiscount::new(discount.clone(), customer.context.clone(), order_amount);

        self.stage = Stage::Selected(Box::new(selected));

        Ok(())
    }

    fn on_order_amount_entered(
        &mut self,
        attempt: Attempt,
        amount: Money<'a, Currency>,
    ) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        selected.order_amount = amount;
        selected.recalculate();

        Ok(())
    }

    fn on_sub_option_chosen(
        &mut self,
        attempt: Attempt,
        selection: Selection,
    ) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        match (selected.discount.kind(), &selection) {
            (DiscountKind::Bank(_), Selection::BankCard { .. })
            | (DiscountKind::FixedPrice(_), Selection::PriceOption(_)) => {}
            (DiscountKind::Bank(_), _) => {
                return Err(TransitionError::WrongSubSelection {
                    expected: "bank card",
                });
            }
            (DiscountKind::FixedPrice(_), _) => {
                return Err(TransitionError::WrongSubSelection {
                    expected: "price option",
                });
            }
            _ => return Err(TransitionError::NoSubSelection),
        }

        selected.selection = Some(selection);
        selected.recalculate();

        Ok(())
    }

    fn on_otp_sent(
        &mut self,
        attempt: Attempt,
        token: SessionToken,
    ) -> Result<(), TransitionError> {
        self.check_otp_send()?;

        let selected = self.stage.selected_mut(attempt)?;

        selected.otp = OtpState::Sent(token);

        Ok(())
    }

    fn on_otp_submitted(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        selected.otp = match &selected.otp {
            OtpState::NotSent => return Err(TransitionError::CodeNotSent),
            OtpState::Checking(_) => return Err(TransitionError::VerificationPending),
            OtpState::Verified => return Err(TransitionError::AlreadyVerified),
            OtpState::Sent(token) | OtpState::Failed(token) => OtpState::Checking(token.clone()),
        };

        Ok(())
    }

    fn on_otp_checked(&mut self, attempt: Attempt, verified: bool) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        let OtpState::Checking(token) = &selected.otp else {
            return Err(attempt.rejected());
        };

        if verified {
            selected.otp = OtpState::Verified;
        } else {
            selected.otp = OtpState::Failed(token.clone());
            selected.otp_failures += 1;
        }

        Ok(())
    }

    fn on_referrer_code_sent(
        &mut self,
        attempt: Attempt,
        phone: PhoneNumber,
        token: SessionToken,
    ) -> Result<(), TransitionError> {
        self.check_referrer_send(&phone)?;

        let selected = self.stage.selected_mut(attempt)?;

        selected.referrer = Some(ReferrerState::CodeSent { phone, token });

        Ok(())
    }

    fn on_referrer_submitted(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;
        let referrer = selected.referrer.as_mut().ok_or(TransitionError::NotReferral)?;

        *referrer = match referrer {
            ReferrerState::Unverified => return Err(TransitionError::CodeNotSent),
            ReferrerState::Checking { .. } => return Err(TransitionError::VerificationPending),
            ReferrerState::Verified => return Err(TransitionError::AlreadyVerified),
            ReferrerState::CodeSent { phone, token } | ReferrerState::Failed { phone, token } => {
                ReferrerState::Checking {
                    phone: phone.clone(),
                    token: token.clone(),
                }
            }
        };

        Ok(())
    }

    fn on_referrer_checked(
        &mut self,
        attempt: Attempt,
        verified: bool,
    ) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        let Some(ReferrerState::Checking { phone, token }) = &selected.referrer else {
            return Err(attempt.rejected());
        };

        if verified {
            let referrer = VerifiedReferrer::new(phone.to_string());

            selected.referrer = Some(ReferrerState::Verified);
            selected.selection = Some(Selection::Referrer(referrer));
            selected.recalculate();
        } else {
            selected.referrer = Some(ReferrerState::Failed {
                phone: phone.clone(),
                token: token.clone(),
            });
            selected.referrer_failures += 1;
        }

        Ok(())
    }

    fn on_name_entered(&mut self, attempt: Attempt, name: &str) -> Result<(), TransitionError> {
        match &self.stage {
            Stage::DiscountList => {}
            stage => {
                stage.selected(attempt)?;
            }
        }

        self.customer_name = name.trim().to_string();

        Ok(())
    }

    fn on_branch_chosen(
        &mut self,
        attempt: Attempt,
        branch: BranchId,
    ) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        if !selected.discount.availability().branches().contains(&branch) {
            return Err(TransitionError::BranchNotOffered(branch));
        }

        selected.branch = Some(branch);

        Ok(())
    }

    fn on_apply(&mut self, attempt: Attempt, at: Timestamp) -> Result<(), TransitionError> {
        let selected = self.stage.selected_mut(attempt)?;

        selected.check_apply(&self.customer_name)?;

        let (Ok(benefit), Some(branch)) = (&selected.benefit, &selected.branch) else {
            return Err(attempt.rejected());
        };

        let record = AppliedDiscount::new(Application {
            discount: &selected.discount,
            order_amount: selected.order_amount,
            benefit,
            selection: selected.selection.as_ref(),
            phone: &self.phone,
            customer_name: &self.customer_name,
            branch,
            applied_at: at,
        });

        selected.apply = ApplyState::Applying(record);

        Ok(())
    }

    fn on_apply_succeeded(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        let Some(record) = self.pending_application().cloned() else {
            return Err(attempt.rejected());
        };

        self.stage = Stage::Applied(Box::new(record));

        Ok(())
    }

    fn on_apply_failed(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        let Stage::Selected(selected) = &mut self.stage else {
            return Err(attempt.rejected());
        };

        if !matches!(selected.apply, ApplyState::Applying(_)) {
            return Err(attempt.rejected());
        }

        selected.apply = ApplyState::Failed;
        selected.apply_failures += 1;

        Ok(())
    }

    fn on_cancel(&mut self, attempt: Attempt) -> Result<(), TransitionError> {
        self.stage.selected(attempt)?;
        self.stage = Stage::DiscountList;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rust_decimal::Decimal;
    use rusty_money::iso::PKR;
    use testresult::TestResult;

    use crate::{
        discounts::{
            AvailabilityDraft, BankCardRule, BankDiscount, DiscountDraft, DiscountStatus,
            FixedPriceDeal, InvalidDiscount, LoyaltyProgram, PercentageDeal, PriceOption,
            ReferralBenefit, ReferralProgram,
        },
        ids::{BankId, CardTypeId},
    };

    use super::*;

    fn pkr(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, PKR)
    }

    fn discount(
        id: &str,
        kind: DiscountKind<'static>,
    ) -> Result<Discount<'static>, InvalidDiscount> {
        Discount::new(DiscountDraft {
            id: id.into(),
            name: id.to_string(),
            status: DiscountStatus::Active,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            availability: AvailabilityDraft {
                all_branches: false,
                branches: vec![BranchId::new("gulberg")],
                ..AvailabilityDraft::default()
            },
            kind,
        })
    }

    fn catalog() -> Result<Vec<Discount<'static>>, InvalidDiscount> {
        Ok(vec![
            discount(
                "twenty",
                DiscountKind::Percentage(PercentageDeal {
                    percentage: Decimal::new(20, 0),
                    cap: Some(pkr(50_000)),
                }),
            )?,
            discount(
                "hbl",
                DiscountKind::Bank(BankDiscount {
                    percentage: Decimal::new(15, 0),
                    cap: None,
                    cards: vec![BankCardRule {
                        bank: BankId::new("hbl"),
                        card_types: smallvec::smallvec![CardTypeId::new("visa")],
                    }],
                }),
            )?,
            discount(
                "set-menu",
                DiscountKind::FixedPrice(FixedPriceDeal {
                    options: vec![PriceOption {
                        id: "set-900".into(),
                        label: "Set menu".to_string(),
                        price: pkr(90_000),
                    }],
                }),
            )?,
            discount(
                "referral",
                DiscountKind::Loyalty(LoyaltyProgram::Referral(ReferralProgram {
                    referrer_benefit: ReferralBenefit::Fixed(pkr(20_000)),
                    referred_benefit: ReferralBenefit::Percentage(Decimal::TEN),
                    cap: None,
                })),
            )?,
        ])
    }

    fn customer(name: Option<&str>) -> ResolvedCustomer {
        ResolvedCustomer {
            context: EvaluationContext::new_customer(
                BranchId::new("gulberg"),
                date(2026, 10, 16).at(19, 0, 0, 0),
            ),
            display_name: name.map(str::to_string),
            known: name.is_some(),
        }
    }

    fn listed(name: Option<&str>) -> Result<Workflow<'static>, Box<dyn std::error::Error>> {
        let mut workflow = Workflow::new(PhoneNumber::parse("03001234567")?);

        workflow.transition(WorkflowEvent::PhoneVerified)?;
        workflow.transition(WorkflowEvent::CustomerResolved {
            customer: customer(name),
            eligible: catalog()?,
        })?;

        Ok(workflow)
    }

    fn verified(id: &str) -> Result<Workflow<'static>, Box<dyn std::error::Error>> {
        let mut workflow = listed(Some("Ayesha"))?;

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: id.into(),
            order_amount: pkr(400_000),
        })?;
        workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-1")))?;
        workflow.transition(WorkflowEvent::OtpSubmitted)?;
        workflow.transition(WorkflowEvent::OtpChecked { verified: true })?;

        Ok(workflow)
    }

    fn at() -> Timestamp {
        Timestamp::UNIX_EPOCH
    }

    #[test]
    fn happy_path_reaches_applied() -> TestResult {
        let mut workflow = verified("twenty")?;

        assert_eq!(workflow.status(), WorkflowStatus::OtpVerified);
        assert_eq!(
            workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("gulberg")))?,
            WorkflowStatus::ReadyToApply
        );
        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() })?,
            WorkflowStatus::Applying
        );

        let pending = workflow.pending_application().cloned();

        assert_eq!(
            workflow.transition(WorkflowEvent::ApplySucceeded)?,
            WorkflowStatus::Applied
        );
        assert_eq!(workflow.applied(), pending.as_ref());
        assert_eq!(workflow.applied().map(|record| record.discount_minor), Some(50_000));

        Ok(())
    }

    #[test]
    fn applied_record_keeps_the_entered_order_amount() -> TestResult {
        let mut workflow = listed(Some("Ayesha"))?;

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: "set-menu".into(),
            order_amount: pkr(70_000),
        })?;
        workflow.transition(WorkflowEvent::SubOptionChosen(Selection::PriceOption(
            "set-900".into(),
        )))?;
        workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-1")))?;
        workflow.transition(WorkflowEvent::OtpSubmitted)?;
        workflow.transition(WorkflowEvent::OtpChecked { verified: true })?;
        workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("gulberg")))?;
        workflow.transition(WorkflowEvent::Apply { at: at() })?;

        let record = workflow
            .pending_application()
            .ok_or("no pending application")?;

        assert_eq!(record.order_minor, 70_000);
        assert_eq!(record.discount_minor, 0);
        assert_eq!(record.final_minor, 90_000);
        assert_eq!(record.tier_label.as_deref(), Some("Set menu"));

        Ok(())
    }

    #[test]
    fn no_eligible_discounts_lands_in_no_discounts() -> TestResult {
        let mut workflow = Workflow::new(PhoneNumber::parse("03001234567")?);

        workflow.transition(WorkflowEvent::PhoneVerified)?;

        assert_eq!(
            workflow.transition(WorkflowEvent::CustomerResolved {
                customer: customer(None),
                eligible: Vec::new(),
            })?,
            WorkflowStatus::NoDiscounts
        );

        Ok(())
    }

    #[test]
    fn apply_guards_leave_state_unchanged() -> TestResult {
        let mut workflow = listed(None)?;

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: "twenty".into(),
            order_amount: pkr(400_000),
        })?;

        let before = workflow.clone();

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::OtpNotVerified)
        );
        assert_eq!(workflow, before);

        workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-1")))?;
        workflow.transition(WorkflowEvent::OtpSubmitted)?;
        workflow.transition(WorkflowEvent::OtpChecked { verified: true })?;

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::MissingCustomerName)
        );

        workflow.transition(WorkflowEvent::NameEntered("  Bilal ".to_string()))?;

        assert_eq!(workflow.customer_name(), "Bilal");
        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::MissingBranch)
        );
        assert_eq!(workflow.status(), WorkflowStatus::OtpVerified);

        Ok(())
    }

    #[test]
    fn bank_discount_needs_card_before_apply() -> TestResult {
        let mut workflow = verified("hbl")?;

        workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("gulberg")))?;

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::Calculation(CalculationError::NoCardSelected))
        );
        assert_eq!(
            workflow.transition(WorkflowEvent::SubOptionChosen(Selection::PriceOption(
                "lunch".into()
            ))),
            Err(TransitionError::WrongSubSelection {
                expected: "bank card"
            })
        );

        workflow.transition(WorkflowEvent::SubOptionChosen(Selection::BankCard {
            bank: BankId::new("hbl"),
            card_type: None,
        }))?;

        assert_eq!(workflow.status(), WorkflowStatus::ReadyToApply);
        assert_eq!(
            workflow
                .benefit()
                .and_then(|benefit| benefit.as_ref().ok())
                .map(|benefit| benefit.amount),
            Some(pkr(60_000))
        );

        Ok(())
    }

    #[test]
    fn referral_needs_verified_referrer() -> TestResult {
        let mut workflow = verified("referral")?;

        workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("gulberg")))?;

        let before = workflow.clone();

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::ReferrerNotVerified)
        );
        assert_eq!(workflow, before);
        assert_eq!(workflow.referrer_status(), Some(ReferrerStatus::Unverified));

        workflow.transition(WorkflowEvent::ReferrerCodeSent {
            phone: PhoneNumber::parse("03007654321")?,
            token: SessionToken::new("ref-1"),
        })?;
        workflow.transition(WorkflowEvent::ReferrerSubmitted)?;
        workflow.transition(WorkflowEvent::ReferrerChecked { verified: false })?;

        assert_eq!(workflow.referrer_status(), Some(ReferrerStatus::Failed));
        assert_eq!(workflow.referrer_failures(), 1);
        assert_eq!(workflow.status(), WorkflowStatus::OtpVerified);

        workflow.transition(WorkflowEvent::ReferrerSubmitted)?;
        workflow.transition(WorkflowEvent::ReferrerChecked { verified: true })?;

        assert_eq!(workflow.status(), WorkflowStatus::ReadyToApply);

        Ok(())
    }

    #[test]
    fn self_referral_is_rejected() -> TestResult {
        let mut workflow = verified("referral")?;

        assert_eq!(
            workflow.transition(WorkflowEvent::ReferrerCodeSent {
                phone: PhoneNumber::parse("0300 123 4567")?,
                token: SessionToken::new("ref-1"),
            }),
            Err(TransitionError::SelfReferral)
        );

        Ok(())
    }

    #[test]
    fn pending_check_rejects_second_submit() -> TestResult {
        let mut workflow = listed(Some("Ayesha"))?;

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: "twenty".into(),
            order_amount: pkr(400_000),
        })?;

        assert_eq!(
            workflow.transition(WorkflowEvent::OtpSubmitted),
            Err(TransitionError::CodeNotSent)
        );

        workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-1")))?;
        workflow.transition(WorkflowEvent::OtpSubmitted)?;

        assert_eq!(
            workflow.transition(WorkflowEvent::OtpSubmitted),
            Err(TransitionError::VerificationPending)
        );
        assert_eq!(
            workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-2"))),
            Err(TransitionError::VerificationPending)
        );

        Ok(())
    }

    #[test]
    fn failed_otp_is_retryable_and_counted() -> TestResult {
        let mut workflow = listed(Some("Ayesha"))?;

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: "twenty".into(),
            order_amount: pkr(400_000),
        })?;
        workflow.transition(WorkflowEvent::OtpSent(SessionToken::new("otp-1")))?;

        for _ in 0..2 {
            workflow.transition(WorkflowEvent::OtpSubmitted)?;

            assert_eq!(
                workflow.transition(WorkflowEvent::OtpChecked { verified: false })?,
                WorkflowStatus::OtpFailed
            );
        }

        assert_eq!(workflow.otp_failures(), 2);
        assert_eq!(workflow.otp_token(), Some(&SessionToken::new("otp-1")));

        workflow.transition(WorkflowEvent::OtpSubmitted)?;

        assert_eq!(
            workflow.transition(WorkflowEvent::OtpChecked { verified: true })?,
            WorkflowStatus::OtpVerified
        );

        Ok(())
    }

    #[test]
    fn cancel_discards_verification() -> TestResult {
        let mut workflow = verified("twenty")?;

        assert_eq!(
            workflow.transition(WorkflowEvent::Cancel)?,
            WorkflowStatus::DiscountList
        );
        assert!(workflow.benefit().is_none());

        workflow.transition(WorkflowEvent::DiscountChosen {
            id: "twenty".into(),
            order_amount: pkr(400_000),
        })?;

        assert_eq!(workflow.status(), WorkflowStatus::DiscountSelected);
        assert_eq!(workflow.otp_failures(), 0);

        Ok(())
    }

    #[test]
    fn branch_must_offer_the_discount() -> TestResult {
        let mut workflow = verified("twenty")?;

        assert_eq!(
            workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("dha"))),
            Err(TransitionError::BranchNotOffered(BranchId::new("dha")))
        );
        assert!(workflow.branch().is_none());

        Ok(())
    }

    #[test]
    fn applying_happens_once() -> TestResult {
        let mut workflow = verified("twenty")?;

        workflow.transition(WorkflowEvent::BranchChosen(BranchId::new("gulberg")))?;
        workflow.transition(WorkflowEvent::Apply { at: at() })?;

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::ApplyPending)
        );
        assert_eq!(
            workflow.transition(WorkflowEvent::Cancel),
            Err(TransitionError::ApplyPending)
        );

        assert_eq!(
            workflow.transition(WorkflowEvent::ApplyFailed)?,
            WorkflowStatus::ApplyFailed
        );
        assert_eq!(workflow.apply_failures(), 1);

        workflow.transition(WorkflowEvent::Apply { at: at() })?;
        workflow.transition(WorkflowEvent::ApplySucceeded)?;

        assert_eq!(
            workflow.transition(WorkflowEvent::Apply { at: at() }),
            Err(TransitionError::AlreadyApplied)
        );
        assert_eq!(workflow.status(), WorkflowStatus::Applied);

        Ok(())
    }

    #[test]
    fn ineligible_choice_is_rejected() -> TestResult {
        let mut workflow = listed(None)?;

        assert_eq!(
            workflow.transition(WorkflowEvent::DiscountChosen {
                id: "missing".into(),
                order_amount: pkr(1_000),
            }),
            Err(TransitionError::NotEligible("missing".into()))
        );
        assert_eq!(workflow.status(), WorkflowStatus::DiscountList);

        Ok(())
    }
}
