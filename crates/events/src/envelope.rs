use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roastah_core::{AggregateId, SellerId};

use crate::event::Event;

/// Where an event belongs: the owning seller and the aggregate stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRef {
    pub seller_id: SellerId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
}

/// An event as recorded in a product's stream.
///
/// `sequence_number` is 1-based and strictly increasing per stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream: StreamRef,
    sequence_number: u64,
    recorded_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    /// Record `payload` at `sequence_number`, assigning a fresh v7 id.
    pub fn record(stream: StreamRef, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            stream,
            sequence_number,
            recorded_at: Utc::now(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn seller_id(&self) -> SellerId {
        self.stream.seller_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.stream.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.stream.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Stable type name of the wrapped event.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_envelopes_get_distinct_ids() {
        let stream = StreamRef {
            seller_id: SellerId::new(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "catalog.product".to_string(),
        };
        let first = EventEnvelope::record(stream.clone(), 1, "created");
        let second = EventEnvelope::record(stream.clone(), 2, "published");

        assert_ne!(first.event_id(), second.event_id());
        assert_eq!(first.aggregate_id(), second.aggregate_id());
        assert_eq!(second.sequence_number(), 2);
        assert_eq!(*second.payload(), "published");
        assert!(first.recorded_at() <= second.recorded_at());
    }
}
