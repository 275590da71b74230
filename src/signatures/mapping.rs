use std::collections::HashMap;

use serde::Serialize;

use crate::signatures::Signature;

#[derive(Debug, Clone)]
pub struct ResolvedSignature {
    pub name: String,
    pub positions: Vec<usize>,
    pub weights: Vec<f64>,
    pub audit: SignatureAudit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureAudit {
    pub signature: String,
    pub size_defined: usize,
    pub size_mappable: usize,
    pub dropped_members: Vec<String>,
}

impl SignatureAudit {
    pub fn dropped(&self) -> usize {
        self.dropped_members.len()
    }

    pub fn is_empty_after_filtering(&self) -> bool {
        self.size_mappable == 0
    }
}

pub fn resolve_signature(
    signature: &Signature,
    column_index: &HashMap<&str, usize>,
) -> ResolvedSignature {
    let mut positions = Vec::with_capacity(signature.len());
    let mut weights = Vec::with_capacity(signature.len());
    let mut dropped = Vec::new();

    for (member, weight) in signature.iter() {
        match column_index.get(member) {
            Some(&pos) => {
                positions.push(pos);
                weights.push(weight);
            }
            None => dropped.push(member.to_string()),
        }
    }

    let audit = SignatureAudit {
        signature: signature.name.clone(),
        size_defined: signature.len(),
        size_mappable: positions.len(),
        dropped_members: dropped,
    };

    ResolvedSignature {
        name: signature.name.clone(),
        positions,
        weights,
        audit,
    }
}
