//! # salus-live
//!
//! The live layer of the Salus messaging core: per-patient conversation
//! threads, the cross-type notification feed with its unread badge, and the
//! change feed that ties multiple browser sessions to one server truth.
//!
//! The consistency strategy throughout is push-triggered re-pull: the change
//! feed only ever says "something changed", and consumers respond by
//! re-fetching and recomputing from the store.  Full recomputation over
//! incremental patching is a deliberate trade at this scale; locally
//! observed state is never more than one change event behind truth and
//! self-corrects on the next event.

pub mod channel;
pub mod feed;
pub mod notify;

mod error;

pub use channel::{resolve_attachment, AttachmentView, ConversationChannel};
pub use error::LiveError;
pub use feed::{ChangeEvent, ChangeFeed, EntityKind, FeedSubscription};
pub use notify::{ChatTarget, NotificationAggregator, NotificationView, Subscription};
