//! Constellation naming boundary.
//!
//! # Responsibility
//! - Define the collaborator contract that turns a member set into a name
//!   and summary.
//! - Normalize collaborator output and provide placeholders on failure.
//!
//! The engine never generates text itself; hosts plug in a namer backed by
//! whatever service they use.

use crate::model::cluster::{ClusterIdentity, ClusterSignature};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest accepted name, in characters.
pub const MAX_NAME_CHARS: usize = 40;
/// Longest accepted summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 120;

const PLACEHOLDER_SUMMARY: &str = "These days trace a single pattern of the heart.";

/// Input handed to a namer for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRequest {
    pub signature: ClusterSignature,
    /// 1-based position of the group within the pass.
    pub ordinal: usize,
    /// Member dates, ascending.
    pub dates: Vec<String>,
    /// Member keywords, in member order.
    pub keywords: Vec<String>,
}

/// Failure reported by a naming collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// Backend not configured or unreachable.
    Unavailable(String),
    /// Backend answered with unusable output.
    Malformed(String),
    /// Backend did not answer in time.
    Timeout,
}

impl Display for NamingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "namer unavailable: {reason}"),
            Self::Malformed(reason) => write!(f, "namer returned malformed output: {reason}"),
            Self::Timeout => write!(f, "namer timed out"),
        }
    }
}

impl Error for NamingError {}

/// Collaborator that names one constellation.
pub trait ConstellationNamer {
    fn name_constellation(&self, request: &NamingRequest) -> Result<ClusterIdentity, NamingError>;
}

/// Namer for hosts without a text backend; always unavailable, so every
/// group gets a placeholder and stays uncached.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNamer;

impl ConstellationNamer for OfflineNamer {
    fn name_constellation(&self, _request: &NamingRequest) -> Result<ClusterIdentity, NamingError> {
        Err(NamingError::Unavailable("no naming backend configured".to_string()))
    }
}

/// Trims and truncates collaborator output.
///
/// # Errors
/// - `Malformed` when either field is blank after trimming.
pub fn sanitize_identity(identity: ClusterIdentity) -> Result<ClusterIdentity, NamingError> {
    let name = truncate_chars(identity.name.trim(), MAX_NAME_CHARS);
    let summary = truncate_chars(identity.summary.trim(), MAX_SUMMARY_CHARS);
    if name.is_empty() {
        return Err(NamingError::Malformed("empty name".to_string()));
    }
    if summary.is_empty() {
        return Err(NamingError::Malformed("empty summary".to_string()));
    }
    Ok(ClusterIdentity::new(name, summary))
}

/// Identity used when naming fails.
pub fn placeholder_identity(ordinal: usize) -> ClusterIdentity {
    ClusterIdentity::new(format!("Constellation {ordinal}"), PLACEHOLDER_SUMMARY)
}

/// Returns whether `identity` came from `placeholder_identity`.
pub fn is_placeholder(identity: &ClusterIdentity) -> bool {
    identity.summary == PLACEHOLDER_SUMMARY && identity.name.starts_with("Constellation ")
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
