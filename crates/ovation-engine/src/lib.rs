//! The Ovation identity-resolution and voting-integrity engine.
//!
//! Six cooperating components, generic over the trait seams in
//! [`ovation_core`]: the session resolver, the member registry gateway, the
//! id allocator, the OTP flow, the vote ledger, and the tally updater.
//! Presentation code consumes this crate directly (or through the
//! `ovation-api` facade); cross-user coordination happens exclusively through
//! the storage layer's constraints, never through in-process shared state.

pub mod allocator;
pub mod ledger;
pub mod otp;
pub mod registry;
pub mod session;
pub mod tally;

#[cfg(test)]
mod mock;

pub use allocator::IdAllocator;
pub use ledger::{LedgerError, SubmitOutcome, ValidationError, VoteLedger, VoteRequest};
pub use otp::{OtpError, OtpFlow, OtpState};
pub use registry::{MemberRegistry, RegistryError};
pub use session::{SessionError, SessionResolver};
pub use tally::{TallyPath, TallyUpdater};

/// Boxed transport error from a store or provider, carried upward without
/// flattening the typed outcome it accompanied.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
