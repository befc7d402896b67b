//! Possession containment: where an actor's carried items go during
//! confinement, and how they come back.
//!
//! Containment actions are mutually exclusive per event: a single entry,
//! exit, or transfer either edits a physical container or serializes a blob
//! onto the Subject record for a given inventory, never both.

use crate::domain::area::{Container, HoldingCell};
use crate::domain::items::{self, Item, WornSlot};
use crate::domain::subject::Subject;
use crate::ports::Environment;
use tracing::{debug, warn};

/// Stash the actor's possessions on entry.
///
/// With a container: the container is cleared, then every carried item whose
/// kind is not deny-listed moves into the first free slot; deny-listed items
/// and overflow stay on the actor. Without a container: the filtered carried
/// and worn sets are serialized into the Subject's two blobs and the actor's
/// possessions are cleared.
pub fn store_possessions(
    env: &dyn Environment,
    deny_list: &[String],
    subject: &mut Subject,
    container: Option<&mut Container>,
) {
    let id = subject.id();

    match container {
        Some(container) => {
            container.clear();

            let mut kept_back = 0usize;
            for item in env.take_carried(id) {
                if items::is_denied(&item.kind, deny_list) {
                    if env.give_item(id, item).is_some() {
                        kept_back += 1;
                    }
                    continue;
                }
                if let Err(item) = container.try_add(item) {
                    // No free slot: the item stays on the actor.
                    if env.give_item(id, item).is_some() {
                        kept_back += 1;
                    }
                }
            }

            if kept_back > 0 {
                warn!(subject = %id, lost = kept_back, "Items could not be returned to the actor");
            }
            debug!(subject = %id, stored = container.len(), "Possessions containered");
        }
        None => {
            let carried: Vec<Item> = env
                .take_carried(id)
                .into_iter()
                .filter(|item| !items::is_denied(&item.kind, deny_list))
                .collect();
            let worn: Vec<(WornSlot, Item)> = env
                .take_worn(id)
                .into_iter()
                .filter(|(_, item)| !items::is_denied(&item.kind, deny_list))
                .collect();

            debug!(subject = %id, carried = carried.len(), worn = worn.len(), "Possessions serialized");
            subject.set_carried_blob(items::encode_items(&carried));
            subject.set_worn_blob(items::encode_worn(&worn));
        }
    }
}

/// Restore the actor's possessions on exit.
///
/// With a container: worn-slot kinds go to the matching empty worn slot,
/// the rest fill free general slots, overflow is dropped at the actor's
/// position; the container is cleared afterward. Without a container: the
/// two blobs are deserialized back onto the actor.
pub fn restore_possessions(
    env: &dyn Environment,
    subject: &mut Subject,
    container: Option<&mut Container>,
) {
    let id = subject.id();

    match container {
        Some(container) => {
            for item in container.take_all() {
                let leftover = match WornSlot::for_kind(&item.kind) {
                    Some(slot) => env.equip_if_empty(id, slot, item),
                    None => Some(item),
                };
                if let Some(item) = leftover {
                    if let Some(item) = env.give_item(id, item) {
                        env.drop_item(id, item);
                    }
                }
            }
        }
        None => {
            match items::decode_items(subject.carried_blob()) {
                Ok(carried) => {
                    for item in carried {
                        if let Some(item) = env.give_item(id, item) {
                            env.drop_item(id, item);
                        }
                    }
                }
                Err(error) => {
                    warn!(subject = %id, %error, "Discarding unreadable carried-possession blob");
                }
            }
            match items::decode_worn(subject.worn_blob()) {
                Ok(worn) => {
                    for (slot, item) in worn {
                        let leftover = env.equip_if_empty(id, slot, item);
                        if let Some(item) = leftover {
                            if let Some(item) = env.give_item(id, item) {
                                env.drop_item(id, item);
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(subject = %id, %error, "Discarding unreadable worn-possession blob");
                }
            }
            subject.set_carried_blob("");
            subject.set_worn_blob("");
        }
    }
}

/// Move contained possessions when a subject transfers between cells.
///
/// Both containers: bulk-copy origin into target and clear the origin.
/// Origin only: serialize origin contents into the Subject record and clear
/// the origin. Neither: no containment action occurs here; the entry/exit
/// rules at the new location take over.
pub fn merge_possessions(
    origin: &mut HoldingCell,
    target: Option<&mut HoldingCell>,
    subject: &mut Subject,
) {
    deposit_transfer(extract_transfer(origin), target, subject);
}

/// First half of a transfer merge: drain the origin cell's container.
/// `None` when the origin has no container.
pub(crate) fn extract_transfer(origin: &mut HoldingCell) -> Option<Vec<Item>> {
    origin.container_mut().map(Container::take_all)
}

/// Second half of a transfer merge: place drained origin contents at the
/// target. With a target container the items are bulk-copied; without one
/// they are serialized into the Subject record.
pub(crate) fn deposit_transfer(
    items: Option<Vec<Item>>,
    target: Option<&mut HoldingCell>,
    subject: &mut Subject,
) {
    let Some(items) = items else {
        return;
    };

    match target.and_then(HoldingCell::container_mut) {
        Some(target_container) => {
            let mut overflow = 0usize;
            for item in items {
                if target_container.try_add(item).is_err() {
                    overflow += 1;
                }
            }
            if overflow > 0 {
                warn!(subject = %subject.id(), overflow, "Target container overflowed during transfer");
            }
        }
        None => {
            subject.set_carried_blob(items::encode_items(&items));
        }
    }
}
