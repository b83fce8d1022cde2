//! SQL boundary (`spec.md` §9 — "navigation is by repository calls, not by
//! chasing pointers"). Every `sqlx::query!`/`query_as!` call in this crate
//! lives under `repo/`; `crate::lifecycle`, `crate::admin`, and friends only
//! ever see `crate::domain` types and call through here.

pub mod access;
pub mod assignee;
pub mod comment;
pub mod event;
pub mod event_notification;
pub mod label;
pub mod participant;
pub mod seen;
pub mod subscription;
pub mod ticket;
pub mod tracker;
pub mod user;
pub mod webhook_subscription;
