use indexmap::map::Entry;

use crate::error::NestfigError;
use crate::namespace::{Namespace, Node, dotted};

/// Deep-merge the definitions in `overlay` into `base`.
///
/// Namespaces present on both sides merge recursively. An option (or
/// aggregation) defined on both sides must be defined identically; anything
/// else is a [`NestfigError::DefinitionConflict`]. New names keep their
/// declaration order after the existing ones.
pub fn deep_merge(base: &mut Namespace, overlay: Namespace) -> Result<(), NestfigError> {
    merge_at("", base, overlay)
}

fn merge_at(prefix: &str, base: &mut Namespace, overlay: Namespace) -> Result<(), NestfigError> {
    let (doc, entries) = overlay.into_parts();
    if base.doc().is_none()
        && let Some(doc) = doc
    {
        base.set_doc(&doc);
    }

    for (name, incoming) in entries {
        let path = dotted(prefix, &name);
        match base.entries_mut().entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), incoming) {
                (Node::Namespace(existing), Node::Namespace(incoming)) => {
                    merge_at(&path, existing, incoming)?;
                }
                (Node::Option(existing), Node::Option(incoming)) => {
                    if *existing != incoming {
                        return Err(NestfigError::DefinitionConflict {
                            path,
                            reason: format!(
                                "defaults '{}' and '{}' (or docs) differ",
                                existing.default_as_str(),
                                incoming.default_as_str()
                            ),
                        });
                    }
                }
                (Node::Aggregation(existing), Node::Aggregation(incoming)) => {
                    if *existing != incoming {
                        return Err(NestfigError::DefinitionConflict {
                            path,
                            reason: "two different aggregation functions".into(),
                        });
                    }
                }
                (existing, incoming) => {
                    return Err(NestfigError::DefinitionConflict {
                        path,
                        reason: format!(
                            "defined as both {} and {}",
                            existing.kind_label(),
                            incoming.kind_label()
                        ),
                    });
                }
            },
        }
    }
    Ok(())
}
