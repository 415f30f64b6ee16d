//! Envelope decoding for domain records.

use std::sync::Arc;

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::store::{NodeStore, RecordId};

/// Converts an opaque domain-record handle into an [`Envelope`].
///
/// The index never inspects record internals itself; every bounding box it
/// learns about a record comes through this trait. Implementations must be
/// side-effect free.
pub trait EnvelopeDecoder: Send + Sync {
    fn decode_envelope(&self, record: RecordId) -> SpatialResult<Envelope>;
}

/// Decodes a record's canonical flat numeric payload, as stored by a
/// [`NodeStore`]:
///
/// - 2 values: a 2D point `[x, y]`
/// - 4 values: `[xmin, ymin, xmax, ymax]`
/// - any other even length `2d`: the first half mins, the second half maxes
///
/// Anything else fails with [`SpatialError::InvalidEnvelope`].
pub struct ArrayEnvelopeDecoder {
    store: Arc<dyn NodeStore>,
}

impl ArrayEnvelopeDecoder {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }
}

impl EnvelopeDecoder for ArrayEnvelopeDecoder {
    fn decode_envelope(&self, record: RecordId) -> SpatialResult<Envelope> {
        let data = self.store.record_data(record)?;
        match data.len() {
            2 => Ok(Envelope::from_point(&data)),
            len if len >= 4 && len % 2 == 0 => Envelope::from_flat(&data),
            len => Err(SpatialError::InvalidEnvelope(format!(
                "record {} has a payload of {} values, expected a point or a flat bounding box",
                record, len
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryNodeStore;

    fn decoder_with_store() -> (Arc<MemoryNodeStore>, ArrayEnvelopeDecoder) {
        let store = Arc::new(MemoryNodeStore::new());
        let decoder = ArrayEnvelopeDecoder::new(store.clone());
        (store, decoder)
    }

    #[test]
    fn test_decode_point() {
        let (store, decoder) = decoder_with_store();
        let record = store.create_record(&[3.0, 4.0]).unwrap();
        let env = decoder.decode_envelope(record).unwrap();
        assert_eq!(env, Envelope::from_point(&[3.0, 4.0]));
    }

    #[test]
    fn test_decode_bbox() {
        let (store, decoder) = decoder_with_store();
        let record = store.create_record(&[0.0, 1.0, 10.0, 11.0]).unwrap();
        let env = decoder.decode_envelope(record).unwrap();
        assert_eq!(env, Envelope::rect(0.0, 1.0, 10.0, 11.0).unwrap());
    }

    #[test]
    fn test_decode_higher_dimensions() {
        let (store, decoder) = decoder_with_store();
        let record = store
            .create_record(&[0.0, 0.0, 0.0, 1.0, 2.0, 3.0])
            .unwrap();
        let env = decoder.decode_envelope(record).unwrap();
        assert_eq!(env.dimension(), 3);
        assert_eq!(env.max(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        let (store, decoder) = decoder_with_store();

        let odd = store.create_record(&[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            decoder.decode_envelope(odd).unwrap_err(),
            SpatialError::InvalidEnvelope(_)
        ));

        let empty = store.create_record(&[]).unwrap();
        assert!(decoder.decode_envelope(empty).is_err());

        // an inverted box is caught by envelope construction
        let inverted = store.create_record(&[10.0, 10.0, 0.0, 0.0]).unwrap();
        assert!(decoder.decode_envelope(inverted).is_err());
    }

    #[test]
    fn test_missing_record_propagates_not_found() {
        let (_store, decoder) = decoder_with_store();
        assert!(matches!(
            decoder.decode_envelope(RecordId(404)).unwrap_err(),
            SpatialError::NotFound(_)
        ));
    }
}
