use std::{any::Any, sync::Arc, time::SystemTime};

use erased_serde::Serialize as ErasedSerialize;
use tokio::time::Instant;
use uuid::Uuid;

/// A message on the bus. Every event belongs to exactly one pipeline run.
pub trait Event: Send + Sync + ErasedSerialize + 'static {
    fn event_id(&self) -> Uuid;
    fn run_id(&self) -> Uuid;
    fn parent_ids(&self) -> &[Uuid];
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> SystemTime;

    fn as_any(&self) -> &dyn Any;
}

erased_serde::serialize_trait_object!(Event);

pub struct EnrichedEvent {
    pub event: Arc<dyn Event>,
    pub ingest_seq: u64,
    pub session_id: Uuid,
    pub ingested_at: Instant,
}

pub fn downcast_ref<T: 'static>(e: &Arc<dyn Event>) -> Option<&T> {
    e.as_any().downcast_ref::<T>()
}

pub fn expect<'a, T: 'static>(
    e: &'a Arc<dyn Event>,
    expected_event_type: &'static str,
) -> anyhow::Result<&'a T> {
    downcast_ref::<T>(e).ok_or_else(|| {
        anyhow::anyhow!(
            "expected event_type={}, got={}",
            expected_event_type,
            e.event_type()
        )
    })
}

/// Fields shared by every event.
#[derive(Clone, Debug, serde::Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub parent_ids: Vec<Uuid>,
    pub timestamp: SystemTime,
}

impl EventHeader {
    pub fn root(run_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            run_id,
            parent_ids: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Header for an event caused by `parent`, in the same run.
    pub fn child_of(parent: &dyn Event) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            run_id: parent.run_id(),
            parent_ids: vec![parent.event_id()],
            timestamp: SystemTime::now(),
        }
    }
}

/// Implements [`Event`] for a struct with a `header: EventHeader` field and an
/// `EVENT_TYPE` constant.
#[macro_export]
macro_rules! impl_event {
    ($ty:ty) => {
        impl $crate::events::Event for $ty {
            fn event_id(&self) -> ::uuid::Uuid {
                self.header.event_id
            }

            fn run_id(&self) -> ::uuid::Uuid {
                self.header.run_id
            }

            fn parent_ids(&self) -> &[::uuid::Uuid] {
                &self.header.parent_ids
            }

            fn event_type(&self) -> &'static str {
                <$ty>::EVENT_TYPE
            }

            fn timestamp(&self) -> ::std::time::SystemTime {
                self.header.timestamp
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}
