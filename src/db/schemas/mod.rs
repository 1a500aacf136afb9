//! Document schemas for the processing core
//!
//! Content records, view events, and the social-graph edges the feed
//! materializer reads. All documents carry soft-delete `Metadata`.

mod content;
mod follow;
mod metadata;
mod view_event;

pub use content::{ContentDoc, CONTENT_COLLECTION};
pub use follow::{FollowDoc, GroupMemberDoc, FOLLOW_COLLECTION, GROUP_MEMBER_COLLECTION};
pub use metadata::Metadata;
pub use view_event::{ViewEventDoc, VIEW_EVENT_COLLECTION};
