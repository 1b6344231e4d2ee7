//! Verification
//!
//! One-time password and referrer verification for a customer lookup: the
//! pure [`Workflow`] state machine, the channels codes are sent through and
//! the async [`VerificationSession`] that drives both.

pub mod channels;
pub mod session;
pub mod workflow;

pub use channels::{ChannelError, OtpChannel, ReferralChannel, SessionToken};
pub use session::{SessionError, SessionServices, VerificationSession};
pub use workflow::{ReferrerStatus, TransitionError, Workflow, WorkflowEvent, WorkflowStatus};
