use std::sync::Arc;

use chrono::Utc;

use super::{from_document, to_document};
use crate::{
  Entity, Error, Id, Result,
  model::{NewUser, Role, User},
  store::{Collection, DocumentStore, Filter, InsertOutcome, Update},
};

const COLLECTION: Collection = Collection::Users;

pub struct UsersRepo<S> {
  store: Arc<S>,
}

impl<S> Clone for UsersRepo<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: DocumentStore> UsersRepo<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn get(&self, id: Id) -> Result<Option<User>> {
    self.find_one(&Filter::by_id(id)).await
  }

  pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
    self.find_one(&Filter::new().eq("email", email)).await
  }

  /// Register a user. Fails with [`Error::AlreadyExists`] if the email is
  /// taken.
  pub async fn create(&self, input: NewUser) -> Result<User> {
    let user = User {
      id:            Id::new(),
      name:          input.name,
      email:         input.email,
      password_hash: input.password_hash,
      role:          input.role,
      created_at:    Utc::now(),
    };

    let outcome = self
      .store
      .insert_one(COLLECTION, to_document(&user)?)
      .await
      .map_err(Error::store)?;

    match outcome {
      InsertOutcome::Inserted => Ok(user),
      InsertOutcome::DuplicateKey => Err(Error::AlreadyExists {
        entity: Entity::User,
        key:    user.email,
      }),
    }
  }

  /// Change a user's role. Only reachable through an admin action.
  pub async fn set_role(&self, id: Id, role: Role) -> Result<()> {
    let outcome = self
      .store
      .update_one(COLLECTION, &Filter::by_id(id), Update::set("role", role.to_string()))
      .await
      .map_err(Error::store)?;

    if outcome.matched == 0 {
      return Err(Error::NotFound(Entity::User));
    }
    Ok(())
  }

  async fn find_one(&self, filter: &Filter) -> Result<Option<User>> {
    self
      .store
      .find_one(COLLECTION, filter)
      .await
      .map_err(Error::store)?
      .map(|d| from_document(COLLECTION, d))
      .transpose()
  }
}
