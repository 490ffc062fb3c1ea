//! Double-buffered hand-off between the acquisition process and the pipeline.
//!
//! One buffer of two halves is filled alternately by the producer. Finishing
//! half 0 raises the half-complete notification, finishing half 1 the
//! full-complete notification. Each notification posts the settled half into
//! a single-slot mailbox; a newer notification replaces an unconsumed older
//! one (drop-oldest).
//!
//! The halves never overlap between the two sides. Every half carries an
//! atomic state (idle, writing, reading):
//! - the producer does not enter a half the consumer is reading; the samples
//!   destined for it are discarded and the producer resumes at the next half
//!   boundary (an overrun, which means the pipeline missed its deadline)
//! - the consumer does not read a half the producer has re-entered since the
//!   notification was posted; that notification is stale and yields no frame
//!
//! Notifications are tagged with a generation so a half rewritten between
//! the consumer's claim and its read is never handed out twice.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use super::{Frame, RawSample};
use crate::config::AcquisitionConfig;
use crate::error::{DoaError, Result};

const EMPTY: usize = 0;

const IDLE: u8 = 0;
const WRITING: u8 = 1;
const READING: u8 = 2;

struct Half<S> {
    data: UnsafeCell<Box<[S]>>,
    state: AtomicU8,
    generation: AtomicUsize,
}

impl<S: RawSample> Half<S> {
    fn new(len: usize) -> Self {
        Self {
            data: UnsafeCell::new(vec![S::default(); len].into_boxed_slice()),
            state: AtomicU8::new(IDLE),
            generation: AtomicUsize::new(0),
        }
    }
}

/// Shared state behind a producer/consumer pair
pub struct DoubleBuffer<S> {
    halves: [Half<S>; 2],
    half_len: usize,
    mailbox: AtomicUsize,
}

// Safety: a half's data is only touched by the side that moved its state
// out of IDLE, and only until it stores IDLE again.
unsafe impl<S: Send> Sync for DoubleBuffer<S> {}

fn encode(generation: usize, half: usize) -> usize {
    ((generation << 1) | half).wrapping_add(1)
}

fn decode(slot: usize) -> (usize, usize) {
    let raw = slot.wrapping_sub(1);
    (raw >> 1, raw & 1)
}

impl<S: RawSample> DoubleBuffer<S> {
    /// Create a double buffer for frames of `frame_len` samples per channel
    ///
    /// Each half holds one interleaved dual-channel frame. With `swapped`
    /// the consumer treats the second slot of each pair as microphone 1.
    pub fn create(frame_len: usize, swapped: bool) -> Result<(FrameProducer<S>, FrameConsumer<S>)> {
        if frame_len == 0 {
            return Err(DoaError::InvalidArgument("frame_len must be positive".into()));
        }

        let shared = Arc::new(Self {
            halves: [Half::new(frame_len * 2), Half::new(frame_len * 2)],
            half_len: frame_len * 2,
            mailbox: AtomicUsize::new(EMPTY),
        });

        let producer = FrameProducer {
            shared: Arc::clone(&shared),
            half: 0,
            pos: 0,
            generation: 0,
            discarding: false,
        };
        let consumer = FrameConsumer { shared, swapped };
        Ok((producer, consumer))
    }

    /// Create a double buffer sized and wired from the acquisition config
    pub fn from_config(config: &AcquisitionConfig) -> Result<(FrameProducer<S>, FrameConsumer<S>)> {
        Self::create(config.frame_len, config.swapped())
    }

    fn try_begin_write(&self, half: usize) -> bool {
        self.halves[half]
            .state
            .compare_exchange(IDLE, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn end_write(&self, half: usize, generation: usize) {
        self.halves[half]
            .generation
            .store(generation, Ordering::Relaxed);
        self.halves[half].state.store(IDLE, Ordering::Release);
    }

    fn try_begin_read(&self, half: usize) -> bool {
        self.halves[half]
            .state
            .compare_exchange(IDLE, READING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn end_read(&self, half: usize) {
        self.halves[half].state.store(IDLE, Ordering::Release);
    }

    /// Post a settled half, replacing any unconsumed notification
    fn post(&self, generation: usize, half: usize) {
        let previous = self
            .mailbox
            .swap(encode(generation, half), Ordering::AcqRel);
        if previous != EMPTY {
            log::trace!("Dropping unconsumed half {}", decode(previous).1);
        }
    }

    /// Withdraw a pending notification for a half about to be rewritten
    fn retract(&self, half: usize) {
        let current = self.mailbox.load(Ordering::Acquire);
        if current != EMPTY && decode(current).1 == half {
            let _ = self.mailbox.compare_exchange(
                current,
                EMPTY,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }
}

/// Acquisition side of the double buffer
///
/// Owned by whatever delivers raw samples: an audio callback, a file
/// replayer or a test.
pub struct FrameProducer<S> {
    shared: Arc<DoubleBuffer<S>>,
    half: usize,
    pos: usize,
    generation: usize,
    discarding: bool,
}

impl<S: RawSample> FrameProducer<S> {
    /// Samples per channel in one frame
    pub fn frame_len(&self) -> usize {
        self.shared.half_len / 2
    }

    /// Append interleaved samples, settling halves as they fill
    ///
    /// Returns how many halves were settled by this call. Input may be of
    /// any length and need not align with half boundaries.
    pub fn write(&mut self, interleaved: &[S]) -> usize {
        let half_len = self.shared.half_len;
        let mut input = interleaved;
        let mut settled = 0;

        while !input.is_empty() {
            if self.pos == 0 {
                self.begin_half();
            }

            let n = (half_len - self.pos).min(input.len());
            if !self.discarding {
                // Safety: this half is in WRITING state, owned by the producer.
                let data = unsafe { &mut *self.shared.halves[self.half].data.get() };
                data[self.pos..self.pos + n].copy_from_slice(&input[..n]);
            }
            self.pos += n;
            input = &input[n..];

            if self.pos == half_len {
                if self.finish_half() {
                    settled += 1;
                }
                self.pos = 0;
                self.half ^= 1;
            }
        }

        settled
    }

    fn begin_half(&mut self) {
        if self.shared.try_begin_write(self.half) {
            self.shared.retract(self.half);
            self.discarding = false;
        } else {
            log::warn!(
                "Acquisition overrun: half {} still being read, discarding block",
                self.half
            );
            self.discarding = true;
        }
    }

    fn finish_half(&mut self) -> bool {
        if self.discarding {
            return false;
        }
        self.generation = self.generation.wrapping_add(1) & (usize::MAX >> 2);
        self.shared.end_write(self.half, self.generation);
        match self.half {
            0 => self.half_complete(),
            _ => self.full_complete(),
        }
        true
    }

    /// First half of the buffer has settled
    fn half_complete(&self) {
        self.shared.post(self.generation, 0);
    }

    /// Second half of the buffer has settled
    fn full_complete(&self) {
        self.shared.post(self.generation, 1);
    }
}

/// Pipeline side of the double buffer
pub struct FrameConsumer<S> {
    shared: Arc<DoubleBuffer<S>>,
    swapped: bool,
}

impl<S: RawSample> FrameConsumer<S> {
    /// Samples per channel in one frame
    pub fn frame_len(&self) -> usize {
        self.shared.half_len / 2
    }

    /// Whether a settled half is waiting
    pub fn is_ready(&self) -> bool {
        self.shared.mailbox.load(Ordering::Acquire) != EMPTY
    }

    /// De-interleave the settled half into `frame` and clear readiness
    ///
    /// Returns `Ok(false)` when nothing is settled or the notification went
    /// stale before the half could be claimed. A frame of the wrong length
    /// is rejected before the mailbox is touched.
    pub fn take_frame(&mut self, frame: &mut Frame) -> Result<bool> {
        if frame.len() != self.frame_len() {
            return Err(DoaError::LengthMismatch {
                expected: self.frame_len(),
                actual: frame.len(),
            });
        }

        let slot = self.shared.mailbox.swap(EMPTY, Ordering::AcqRel);
        if slot == EMPTY {
            return Ok(false);
        }
        let (generation, half) = decode(slot);

        if !self.shared.try_begin_read(half) {
            log::debug!("Half {} re-entered by producer before it was read", half);
            return Ok(false);
        }

        let stamped = self.shared.halves[half].generation.load(Ordering::Relaxed);
        if stamped != generation {
            self.shared.end_read(half);
            log::debug!("Half {} rewritten since notification, skipping", half);
            return Ok(false);
        }

        // Safety: this half is in READING state, owned by the consumer.
        let data = unsafe { &*self.shared.halves[half].data.get() };
        let result = frame.fill_from_interleaved(data, self.swapped);
        self.shared.end_read(half);
        result.map(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frame_len: usize, a: f32, b: f32) -> Vec<f32> {
        (0..frame_len).flat_map(|_| [a, b]).collect()
    }

    #[test]
    fn test_zero_frame_len_rejected() {
        assert!(DoubleBuffer::<u16>::create(0, false).is_err());
    }

    #[test]
    fn test_half_settles_frame() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        let mut frame = Frame::new(4);

        assert!(!consumer.is_ready());
        assert!(!consumer.take_frame(&mut frame).unwrap());

        assert_eq!(producer.write(&block(4, 0.25, -0.5)), 1);
        assert!(consumer.is_ready());
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.25));
        assert!(frame.ch2.iter().all(|&v| v == -0.5));

        assert!(!consumer.is_ready());
        assert!(!consumer.take_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_partial_half_not_ready() {
        let (mut producer, consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        assert_eq!(producer.write(&[0.1; 7]), 0);
        assert!(!consumer.is_ready());
        assert_eq!(producer.write(&[0.1; 1]), 1);
        assert!(consumer.is_ready());
    }

    #[test]
    fn test_unaligned_writes_span_halves() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(2, false).unwrap();
        let mut frame = Frame::new(2);

        // 1.5 halves, then the remaining 0.5
        let data: Vec<f32> = vec![0.1, 0.2, 0.1, 0.2, 0.3, 0.4];
        assert_eq!(producer.write(&data), 1);
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert_eq!(frame.ch1, vec![0.1, 0.1]);

        assert_eq!(producer.write(&[0.3, 0.4]), 1);
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert_eq!(frame.ch1, vec![0.3, 0.3]);
        assert_eq!(frame.ch2, vec![0.4, 0.4]);
    }

    #[test]
    fn test_drop_oldest() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        let mut frame = Frame::new(4);

        producer.write(&block(4, 0.1, 0.1));
        producer.write(&block(4, 0.2, 0.2));

        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.2), "newest half wins");
        assert!(!consumer.take_frame(&mut frame).unwrap(), "older half dropped");
    }

    #[test]
    fn test_pending_notification_survives_other_half_write() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        let mut frame = Frame::new(4);

        producer.write(&block(4, 0.1, 0.1));
        producer.write(&block(4, 0.2, 0.2));
        // Start rewriting half 0; the pending notification names half 1
        // and stays valid.
        producer.write(&[0.3, 0.3]);
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.2));

        // Finish half 0, start half 1: its own notification is pending and
        // the producer retracts nothing it should not.
        producer.write(&block(4, 0.3, 0.3)[2..]);
        producer.write(&[0.4, 0.4]);
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.3));
    }

    #[test]
    fn test_swapped_channels() {
        let (mut producer, mut consumer) = DoubleBuffer::<u16>::create(2, true).unwrap();
        let mut frame = Frame::new(2);
        producer.write(&[32768, 49152, 32768, 49152]);
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert_eq!(frame.ch1, vec![0.5, 0.5]);
        assert_eq!(frame.ch2, vec![0.0, 0.0]);
    }

    #[test]
    fn test_wrong_frame_len_leaves_mailbox() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        producer.write(&block(4, 0.1, 0.1));

        let mut wrong = Frame::new(3);
        assert!(consumer.take_frame(&mut wrong).is_err());
        assert!(consumer.is_ready());

        let mut frame = Frame::new(4);
        assert!(consumer.take_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_producer_never_enters_half_being_read() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(4, false).unwrap();
        let mut frame = Frame::new(4);

        producer.write(&block(4, 0.1, 0.1));
        // Consumer is mid-read of half 0
        assert!(consumer.shared.try_begin_read(0));

        producer.write(&block(4, 0.2, 0.2)); // half 1 settles
        producer.write(&block(4, 0.3, 0.3)); // half 0 busy: discarded

        let data = unsafe { &*consumer.shared.halves[0].data.get() };
        assert!(data.iter().all(|&v| v == 0.1), "half 0 untouched");
        consumer.shared.end_read(0);

        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.2));

        // Producer resumes at the next boundary (half 1)
        producer.write(&block(4, 0.4, 0.4));
        assert!(consumer.take_frame(&mut frame).unwrap());
        assert!(frame.ch1.iter().all(|&v| v == 0.4));
    }

    #[test]
    fn test_consumer_skips_rewritten_half() {
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(2, false).unwrap();
        let mut frame = Frame::new(2);

        producer.write(&block(2, 0.1, 0.1)); // half 0, generation 1
        let stale = consumer.shared.mailbox.swap(EMPTY, Ordering::AcqRel);
        producer.write(&block(2, 0.2, 0.2)); // half 1
        producer.write(&block(2, 0.3, 0.3)); // half 0 again, generation 3

        // Replay the old claim: the half was rewritten since.
        consumer.shared.mailbox.store(stale, Ordering::Release);
        assert!(!consumer.take_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_threaded_frames_are_never_torn() {
        let frame_len = 64;
        let halves = 2000;
        let (mut producer, mut consumer) = DoubleBuffer::<f32>::create(frame_len, false).unwrap();
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                for k in 0..halves {
                    let v = (k % 1000) as f32 / 1000.0;
                    producer.write(&block(frame_len, v, -v));
                }
                done.store(true, Ordering::Release);
            });

            let mut frame = Frame::new(frame_len);
            let mut taken = 0;
            loop {
                let finished = done.load(Ordering::Acquire);
                if consumer.take_frame(&mut frame).unwrap() {
                    taken += 1;
                    let v = frame.ch1[0];
                    assert!(frame.ch1.iter().all(|&x| x == v), "torn frame");
                    assert!(frame.ch2.iter().all(|&x| x == -v), "torn frame");
                } else if finished {
                    break;
                } else {
                    std::hint::spin_loop();
                }
            }
            assert!(taken > 0);
        });
    }
}
