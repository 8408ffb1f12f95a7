//! Row-ownership authorization.
//!
//! Every book and note belongs to exactly one user; only that user may act
//! on it. Notes have no view rule of their own, they are seen through their
//! book.

use crate::error::{LibraryError, LibraryResult};
use crate::models::{Book, Note, User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
  View,
  Update,
  Delete,
}

impl Ability {
  fn verb(&self) -> &'static str {
    match self {
      Ability::View => "view",
      Ability::Update => "update",
      Ability::Delete => "delete",
    }
  }
}

pub trait Owned {
  const KIND: &'static str;

  fn id(&self) -> i64;
  fn owner_id(&self) -> UserId;

  /// Abilities this kind of record can grant at all.
  fn grants(ability: Ability) -> bool;
}

impl Owned for Book {
  const KIND: &'static str = "book";

  fn id(&self) -> i64 {
    self.id
  }

  fn owner_id(&self) -> UserId {
    self.user_id
  }

  fn grants(_ability: Ability) -> bool {
    true
  }
}

impl Owned for Note {
  const KIND: &'static str = "note";

  fn id(&self) -> i64 {
    self.id
  }

  fn owner_id(&self) -> UserId {
    self.user_id
  }

  fn grants(ability: Ability) -> bool {
    matches!(ability, Ability::Update | Ability::Delete)
  }
}

pub fn allows<T: Owned>(user: &User, record: &T, ability: Ability) -> bool {
  T::grants(ability) && user.id == record.owner_id()
}

pub fn authorize<T: Owned>(user: &User, record: &T, ability: Ability) -> LibraryResult<()> {
  if allows(user, record, ability) {
    return Ok(());
  }
  log::warn!(
    "user {} denied {} on {} {}",
    user.id,
    ability.verb(),
    T::KIND,
    record.id()
  );
  Err(LibraryError::Forbidden {
    action: format!("{} {} {}", ability.verb(), T::KIND, record.id()),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(id: UserId) -> User {
    User {
      id,
      name: format!("user{}", id),
      email: format!("user{}@example.com", id),
    }
  }

  fn note(owner: UserId) -> Note {
    Note {
      id: 7,
      user_id: owner,
      book_id: 1,
      content: "margin".to_string(),
      page_number: None,
      tags: vec![],
      created_at: 0,
      updated_at: 0,
    }
  }

  #[test]
  fn note_owner_may_update_and_delete() {
    let owner = user(1);
    assert!(allows(&owner, &note(1), Ability::Update));
    assert!(allows(&owner, &note(1), Ability::Delete));
  }

  #[test]
  fn strangers_are_forbidden() {
    let err = authorize(&user(2), &note(1), Ability::Delete).expect_err("stranger");
    match err {
      LibraryError::Forbidden { action } => assert_eq!(action, "delete note 7"),
      other => panic!("unexpected error: {:?}", other),
    }
  }

  #[test]
  fn notes_have_no_direct_view_rule() {
    assert!(!allows(&user(1), &note(1), Ability::View));
  }
}
