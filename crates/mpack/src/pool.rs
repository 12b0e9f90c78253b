//! `Pool` — bounded, mutex-guarded recycling of encoder/decoder instances.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Decoder, DecoderOptions, Encoder, Factory};

/// A bounded LIFO pool of encoders and decoders minted from one frozen
/// factory.
///
/// Checkout and return are the only operations under the lock; the yielded
/// instance is used outside it. Instances are reset before being returned,
/// and the pool mints lazily when empty, so the capacity is an upper bound,
/// not a pre-allocation.
///
/// # Example
///
/// ```
/// use mpack::{Factory, Value};
///
/// let pool = Factory::new().pool(4);
/// let bytes = pool
///     .with_encoder(|encoder| {
///         encoder.write(&Value::Int(42))?;
///         encoder.finalize()
///     })
///     .unwrap();
/// let value = pool.with_decoder(|decoder| decoder.decode(&bytes)).unwrap();
/// assert_eq!(value, Value::Int(42));
/// ```
pub struct Pool {
    factory: Arc<Factory>,
    encoders: Mutex<Vec<Encoder>>,
    decoders: Mutex<Vec<Decoder>>,
    capacity: usize,
    decoder_options: DecoderOptions,
}

impl Pool {
    /// Wraps a frozen factory. Use [`Factory::pool`] instead of calling this
    /// directly.
    pub(crate) fn new(factory: Arc<Factory>, capacity: usize) -> Self {
        Self::with_decoder_options(factory, capacity, DecoderOptions::default())
    }

    pub(crate) fn with_decoder_options(
        factory: Arc<Factory>,
        capacity: usize,
        decoder_options: DecoderOptions,
    ) -> Self {
        Self {
            factory,
            encoders: Mutex::new(Vec::new()),
            decoders: Mutex::new(Vec::new()),
            capacity,
            decoder_options,
        }
    }

    /// The factory whose registrations every pooled instance shares.
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Checks out an encoder, yields it, then resets and returns it.
    pub fn with_encoder<R>(&self, f: impl FnOnce(&mut Encoder) -> R) -> R {
        let mut encoder = self
            .encoders
            .lock()
            .pop()
            .unwrap_or_else(|| self.factory.encoder());
        let out = f(&mut encoder);
        encoder.reset();
        let mut idle = self.encoders.lock();
        if idle.len() < self.capacity {
            idle.push(encoder);
        }
        out
    }

    /// Checks out a decoder, yields it, then resets and returns it.
    pub fn with_decoder<R>(&self, f: impl FnOnce(&mut Decoder) -> R) -> R {
        let mut decoder = self
            .decoders
            .lock()
            .pop()
            .unwrap_or_else(|| self.factory.decoder(self.decoder_options));
        let out = f(&mut decoder);
        decoder.reset();
        let mut idle = self.decoders.lock();
        if idle.len() < self.capacity {
            idle.push(decoder);
        }
        out
    }

    /// Number of idle encoders currently held.
    pub fn idle_encoders(&self) -> usize {
        self.encoders.lock().len()
    }

    /// Number of idle decoders currently held.
    pub fn idle_decoders(&self) -> usize {
        self.decoders.lock().len()
    }
}
