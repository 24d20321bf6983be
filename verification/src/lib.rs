//! Identity proof verification for airdrop claims.
//!
//! A claim carries a zero-knowledge proof over identity-document data plus an
//! ordered list of public inputs. Verification runs, in order:
//!
//! 1. **Proof**: cryptographic validity under the key configured for the
//!    request's algorithm (pluggable via [`ProofVerifier`]).
//! 2. **Freshness**: the current-date input equals today's UTC date and the
//!    document has not expired.
//! 3. **Age**: the birth date is at least `min_age` years ago.
//! 4. **Citizenship**: the document's country is in the allow-list.
//! 5. **Selector** and **event id**: the proof targets this campaign.
//! 6. **Address binding**: the proof commits to the claimed address.
//! 7. **Uniqueness**: the nullifier is not already claimed.
//!
//! Input positions come from a deployment-configured [`PublicInputSchema`].

pub mod binding;
pub mod dates;
pub mod error;
pub mod field;
pub mod groth16;
pub mod identity;
pub mod proof;
pub mod request;
pub mod schema;

pub use binding::AddressBindingMode;
pub use error::{ProofError, Rejection, VerificationError};
pub use groth16::Groth16Verifier;
pub use identity::{EligibilityPolicy, IdentityVerifier, VerifiedClaim};
pub use proof::{ProofVerifier, VerificationKey, VerificationKeys};
pub use request::{ClaimRequest, ZkProof};
pub use schema::{CurrentDateLayout, PublicInputSchema, PublicInputs};
