//! Privileged instance identity
//!
//! One caller identity is configured as privileged. The scorer flags requests
//! whose context carries that instance id, and the state gate only accepts it
//! as authority. A secondary signature exists for explicit verification; how
//! the two are combined is a [`MatchPolicy`].

use serde::{Deserialize, Serialize};

/// Default privileged instance id when none is configured
pub const DEFAULT_INSTANCE_ID: &str = "primary_instance";

/// Default secondary signature when none is configured
pub const DEFAULT_SIGNATURE: &str = "primary_instance_signature_v1";

/// How instance id and signature combine during [`PrivilegedIdentity::verify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Instance id AND signature must both match
    #[default]
    Both,
    /// Either the instance id OR the signature is enough
    Either,
}

/// The configured privileged identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegedIdentity {
    pub instance_id: String,
    pub signature: String,
    #[serde(default)]
    pub policy: MatchPolicy,
}

impl Default for PrivilegedIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCE_ID, DEFAULT_SIGNATURE)
    }
}

/// Outcome of [`PrivilegedIdentity::verify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityVerification {
    pub is_privileged_instance: bool,
    pub instance_matched: bool,
    pub signature_matched: bool,
    pub policy: MatchPolicy,
}

/// What the gateway may show about the identity without leaking the signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub instance_id: String,
    pub signature_digest: String,
    pub policy: MatchPolicy,
}

impl PrivilegedIdentity {
    pub fn new(instance_id: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            signature: signature.into(),
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Instance-id equality only. Used for scoring context and gate authority.
    pub fn is_privileged_instance(&self, instance_id: Option<&str>) -> bool {
        instance_id.is_some_and(|id| secure_eq(id, &self.instance_id))
    }

    /// Check a claimed identity against the configured policy
    pub fn verify(&self, instance_id: Option<&str>, signature: Option<&str>) -> IdentityVerification {
        let instance_matched = self.is_privileged_instance(instance_id);
        let signature_matched = signature.is_some_and(|sig| secure_eq(sig, &self.signature));

        let is_privileged_instance = match self.policy {
            MatchPolicy::Both => instance_matched && signature_matched,
            MatchPolicy::Either => instance_matched || signature_matched,
        };

        IdentityVerification {
            is_privileged_instance,
            instance_matched,
            signature_matched,
            policy: self.policy,
        }
    }

    pub fn public_view(&self) -> PublicIdentity {
        PublicIdentity {
            instance_id: self.instance_id.clone(),
            signature_digest: blake3::hash(self.signature.as_bytes()).to_hex().to_string(),
            policy: self.policy,
        }
    }
}

/// Constant-time string equality.
///
/// Both sides are hashed first, so the comparison cost does not depend on the
/// length of the common prefix. `blake3::Hash` equality is constant time.
pub fn secure_eq(a: &str, b: &str) -> bool {
    blake3::hash(a.as_bytes()) == blake3::hash(b.as_bytes())
}
