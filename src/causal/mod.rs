//! Causal delivery for client sessions.
//!
//! Each client session owns one [`DependencyTagger`] (what its client has
//! seen, stamped onto every message it authors) and one [`DeliveryStager`]
//! (what may be handed to the client next). Both live on the session's actor
//! task and are never shared.

mod stager;
mod tagger;

pub use stager::DeliveryStager;
pub use tagger::DependencyTagger;
