//! The bidirectional-link protocol (spec.md §4.3, §4.2.3, §4.2.4).
//!
//! `Model` owns every `Object`, so the actual primitive add/remove and the
//! diff-then-apply orchestration live there (see `model::link`) — this
//! module only holds the small value type used to describe a "set the
//! whole container to this" update, shared between the public API and the
//! XMI decoder's deferred-link pass.

use crate::util::IStr;

/// The new contents of a link-to-many property, as supplied by a caller of
/// `Model::set_link_many`. `Map`/`MultiMap` properties derive their key
/// from the target automatically (spec.md §4.2.4), so this only ever needs
/// a flat list of member ids regardless of which container kind the
/// property declares.
#[derive(Debug, Clone, Default)]
pub struct LinkManyUpdate {
    pub members: Vec<IStr>,
}

impl LinkManyUpdate {
    pub fn new(members: Vec<IStr>) -> Self {
        Self { members }
    }
}

impl FromIterator<IStr> for LinkManyUpdate {
    fn from_iter<T: IntoIterator<Item = IStr>>(iter: T) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}
