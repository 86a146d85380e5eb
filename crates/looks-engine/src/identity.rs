//! Caller identity as handed over by the authentication layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, VoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  Voter,
  Operator,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
  pub user_id: Uuid,
  pub role:    Role,
}

impl Caller {
  /// Fails with [`VoteError::Forbidden`] unless the caller is an operator.
  pub fn require_operator(&self) -> Result<()> {
    match self.role {
      Role::Operator => Ok(()),
      Role::Voter => Err(VoteError::Forbidden(format!(
        "user {} is not an operator",
        self.user_id
      ))),
    }
  }

  /// Fails with [`VoteError::Forbidden`] when a request names a voter other
  /// than the caller.
  pub fn ensure_voter(&self, claimed: Option<Uuid>) -> Result<Uuid> {
    match claimed {
      Some(id) if id != self.user_id => Err(VoteError::Forbidden(format!(
        "cannot vote as {id}"
      ))),
      _ => Ok(self.user_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_operators_pass() {
    let voter = Caller { user_id: Uuid::new_v4(), role: Role::Voter };
    let op = Caller { user_id: Uuid::new_v4(), role: Role::Operator };
    assert!(matches!(voter.require_operator(), Err(VoteError::Forbidden(_))));
    assert!(op.require_operator().is_ok());
  }

  #[test]
  fn voter_id_must_match_caller() {
    let caller = Caller { user_id: Uuid::new_v4(), role: Role::Voter };
    assert_eq!(caller.ensure_voter(None).unwrap(), caller.user_id);
    assert_eq!(caller.ensure_voter(Some(caller.user_id)).unwrap(), caller.user_id);
    assert!(caller.ensure_voter(Some(Uuid::new_v4())).is_err());
  }
}
