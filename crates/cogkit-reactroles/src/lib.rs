//! `cogkit-reactroles` — grant and revoke roles from message reactions.
//!
//! # Overview
//!
//! Operators bind an emoji on a message to a role. When a member clicks the
//! reaction the bound role is granted; removing the reaction revokes it.
//! Messages can be *linked* into a group whose roles are mutually
//! exclusive: gaining one role in the group queues the removal of the
//! others.
//!
//! Rapid-fire reaction events targeting the same member are not applied one
//! by one. They accumulate in a [`PendingDelta`] per (guild, user) subject
//! and a single worker applies each delta as one batched membership edit,
//! at a fixed pace, retrying failed edits indefinitely. See [`queue`].

pub mod bindings;
pub mod cog;
pub mod delta;
pub mod queue;

pub use bindings::RoleBindings;
pub use cog::ReactRolesCog;
pub use delta::PendingDelta;
pub use queue::{role_queue, RoleQueue, RoleQueueWorker};
