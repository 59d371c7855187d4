use std::collections::HashMap;

use crate::entity::{RawEntity, ResolvedEntity};

/// Collapse duplicate candidates across a document.
///
/// Candidates sharing a label and case-insensitive text form one group; the
/// group keeps its highest-confidence member, and on an exact tie the one
/// seen first. Groups come back in the order their keys were first seen.
pub fn resolve_entities(entities: &[RawEntity]) -> Vec<ResolvedEntity> {
    let mut index = HashMap::with_capacity(entities.len());
    let mut resolved: Vec<ResolvedEntity> = Vec::new();

    for entity in entities {
        match index.get(&entity.dedup_key()) {
            Some(&slot) => {
                let group: &mut ResolvedEntity = &mut resolved[slot];
                group.group_size += 1;
                if entity.confidence > group.entity.confidence {
                    group.entity = entity.clone();
                }
            }
            None => {
                index.insert(entity.dedup_key(), resolved.len());
                resolved.push(ResolvedEntity::new(entity.clone()));
            }
        }
    }

    resolved
}
