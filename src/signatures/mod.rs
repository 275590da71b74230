use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CtxError, Result};
use crate::model::ColumnAxis;

pub mod gmt;
pub mod mapping;

pub use mapping::{ResolvedSignature, SignatureAudit, resolve_signature};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub axis: Option<ColumnAxis>,
    members: Vec<String>,
    weights: Vec<f64>,
}

impl Signature {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_weights(name, members.into_iter().map(|m| (m, 1.0)))
    }

    pub fn with_weights<I, S>(name: impl Into<String>, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CtxError::InvalidSignature {
                name,
                reason: "name must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut out_members = Vec::new();
        let mut out_weights = Vec::new();
        let mut duplicates = 0usize;
        for (member, weight) in members {
            let member: String = member.into();
            if !weight.is_finite() || weight < 0.0 {
                return Err(CtxError::InvalidSignature {
                    name,
                    reason: format!("member {member:?} has invalid weight {weight}"),
                });
            }
            if !seen.insert(member.clone()) {
                duplicates += 1;
                continue;
            }
            out_members.push(member);
            out_weights.push(weight);
        }

        if out_members.is_empty() {
            return Err(CtxError::InvalidSignature {
                name,
                reason: "signature has no members".to_string(),
            });
        }
        if out_weights.iter().sum::<f64>() <= 0.0 {
            return Err(CtxError::InvalidSignature {
                name,
                reason: "weights sum to zero".to_string(),
            });
        }
        if duplicates > 0 {
            debug!(signature = %name, duplicates, "collapsed duplicate signature members");
        }

        Ok(Self {
            name,
            axis: None,
            members: out_members,
            weights: out_weights,
        })
    }

    pub fn with_axis(mut self, axis: ColumnAxis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.members
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/signatures/tests.rs"]
mod tests;
