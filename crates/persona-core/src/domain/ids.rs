//! Id aliases. Bare `Uuid`s are passed around directly rather than wrapped in
//! per-entity newtypes — the aliases exist for readability at call sites, not
//! for type-level separation.

use uuid::Uuid;

pub type UserId = Uuid;
pub type ProductId = Uuid;
pub type PersonaId = Uuid;
pub type SessionId = Uuid;
pub type ResultId = Uuid;

pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
