//! Rate Limiter (Token Bucket Algorithm)
//!
//! One bucket per user, so a single member hammering a button cannot starve
//! everyone else's interactions.

use queuebot_core::domain::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Idle buckets are dropped once the table grows past this
const BUCKET_PRUNE_THRESHOLD: usize = 4096;

/// Token bucket with lock-free consumption
struct TokenBucket {
    // See `pack`; the stamp is ms since `origin`
    packed: AtomicU64,
    origin: Instant,
}

impl TokenBucket {
    fn full(max_tokens: u32, origin: Instant) -> Self {
        let bucket = Self {
            packed: AtomicU64::new(0),
            origin,
        };
        bucket
            .packed
            .store(pack(max_tokens, bucket.now_ms()), Ordering::Release);
        bucket
    }

    /// Milliseconds since `origin`, truncated to 32 bits (wraps every ~49.7 days)
    fn now_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }

    /// Consume one token if available
    fn try_take(&self, max_tokens: u32, refill_rate: u32) -> bool {
        self.take_at(self.now_ms(), max_tokens, refill_rate)
    }

    fn take_at(&self, now_ms: u32, max_tokens: u32, refill_rate: u32) -> bool {
        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let (tokens, last_refill_ms) = unpack(packed);

            // Stamps are modular, so the difference survives the 32-bit wrap
            let delta_ms = now_ms.wrapping_sub(last_refill_ms);
            let refilled = (delta_ms as u64 * refill_rate as u64) / 1000;
            let available = (tokens as u64 + refilled).min(max_tokens as u64) as u32;

            // Keep the old timestamp until a whole token has accrued
            let stamp = if refilled > 0 { now_ms } else { last_refill_ms };
            let (remaining, allowed) = if available >= 1 {
                (available - 1, true)
            } else {
                (available, false)
            };

            if self
                .packed
                .compare_exchange(packed, pack(remaining, stamp), Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                return allowed;
            }
        }
    }

    fn is_full(&self, max_tokens: u32, refill_rate: u32) -> bool {
        let (tokens, last_refill_ms) = unpack(self.packed.load(Ordering::Acquire));
        let delta_ms = self.now_ms().wrapping_sub(last_refill_ms);
        tokens as u64 + (delta_ms as u64 * refill_rate as u64) / 1000 >= max_tokens as u64
    }
}

// Upper 32 bits: tokens, lower 32 bits: last refill stamp
fn pack(tokens: u32, stamp_ms: u32) -> u64 {
    ((tokens as u64) << 32) | stamp_ms as u64
}

fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, (packed & 0xFFFF_FFFF) as u32)
}

/// Per-user rate limiter
pub struct UserRateLimiter {
    buckets: Mutex<HashMap<UserId, Arc<TokenBucket>>>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
    origin: Instant,
}

impl UserRateLimiter {
    /// `max_tokens` is the burst size, `refill_rate` the sustained requests per second
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            refill_rate,
            origin: Instant::now(),
        }
    }

    /// Returns true if `user` may proceed (consumes one token)
    pub fn check(&self, user: UserId) -> bool {
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            if buckets.len() > BUCKET_PRUNE_THRESHOLD {
                let (max, rate) = (self.max_tokens, self.refill_rate);
                buckets.retain(|_, b| !b.is_full(max, rate));
            }
            buckets
                .entry(user)
                .or_insert_with(|| Arc::new(TokenBucket::full(self.max_tokens, self.origin)))
                .clone()
        };
        bucket.try_take(self.max_tokens, self.refill_rate)
    }

    /// Users currently tracked
    pub fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
