// Queue list rendering

use crate::domain::{Member, UserId};
use std::collections::HashMap;

/// Display names known for this interaction (actor and targets)
#[derive(Debug, Default)]
pub struct KnownNames(HashMap<UserId, String>);

impl KnownNames {
    pub fn from_members<'a>(members: impl IntoIterator<Item = &'a Member>) -> Self {
        Self(
            members
                .into_iter()
                .filter_map(|m| m.display_name.clone().map(|name| (m.id, name)))
                .collect(),
        )
    }

    pub fn get(&self, id: UserId) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }
}

/// One line per member, numbered from `first_position`
///
/// `**#1** Alice (<@11>)` when the name is known, `**#1** <@11>` otherwise.
pub fn render_members(members: &[UserId], first_position: usize, names: &KnownNames) -> String {
    members
        .iter()
        .enumerate()
        .map(|(offset, &id)| {
            let n = first_position + offset;
            match names.get(id) {
                Some(name) => format!("**#{}** {} (<@{}>)", n, name, id),
                None => format!("**#{}** <@{}>", n, id),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
