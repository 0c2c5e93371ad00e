//! Type-safe, efficient identifiers for transit entities.
//!
//! All identifiers use Arc<str> for cheap cloning and minimal memory overhead.
//! Identifiers are feed-scoped by convention: `"<feed>:<local id>"`. An identifier
//! without a separator belongs to the empty feed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between the feed id and the local id.
pub const FEED_SEPARATOR: char = ':';

macro_rules! impl_identifier {
    ($name:ident) => {
        #[derive(Clone, Debug)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(s.as_ref().into())
            }

            /// Build an identifier from a feed id and a feed-local id.
            pub fn scoped(feed_id: &str, local_id: &str) -> Self {
                Self(format!("{feed_id}{FEED_SEPARATOR}{local_id}").into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Feed this identifier belongs to.
            pub fn feed_id(&self) -> &str {
                self.0
                    .split_once(FEED_SEPARATOR)
                    .map(|(feed, _)| feed)
                    .unwrap_or("")
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

impl_identifier!(AgencyId);
impl_identifier!(StopId);
impl_identifier!(StationId);
impl_identifier!(RouteId);
impl_identifier!(GroupOfRoutesId);
impl_identifier!(TripId);
impl_identifier!(PatternId);
impl_identifier!(ServiceId);
impl_identifier!(TripOnServiceDateId);
impl_identifier!(NoticeId);
