//! Bounded, closable frame queue with typed producer roles.
//!
//! Each direction of a tunnel is a [`MessageChannel`]. The channel is created
//! together with its single [`Producer<Owner>`]; only the owner can close it.
//! Other producers are [`Producer<Participant>`] handles and can only enqueue.
//!
//! Consumers take an exclusive lock on the receiving half, so at most one
//! [`Consumer`] drains a channel at any time. Once the lock is released a
//! later consumer (for example a reconnecting client) resumes where the
//! previous one stopped.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::ChannelClosed;
use crate::frame::Frame;

mod sealed {
    pub trait Sealed {}
}

/// Producer role marker.
pub trait Role: sealed::Sealed + Send + Sync + 'static {
    /// Whether finishing the producer closes the channel.
    const CLOSES_ON_FINISH: bool;
    /// Role name used in logs.
    const NAME: &'static str;
}

/// The producer allowed to close the channel.
#[derive(Debug)]
pub enum Owner {}

/// A producer that may enqueue but never closes the channel.
#[derive(Debug)]
pub enum Participant {}

impl sealed::Sealed for Owner {}
impl sealed::Sealed for Participant {}

impl Role for Owner {
    const CLOSES_ON_FINISH: bool = true;
    const NAME: &'static str = "owner";
}

impl Role for Participant {
    const CLOSES_ON_FINISH: bool = false;
    const NAME: &'static str = "participant";
}

/// One direction of a relay session.
pub struct MessageChannel {
    tx: mpsc::Sender<Frame>,
    rx: Arc<Mutex<mpsc::Receiver<Frame>>>,
    closed: CancellationToken,
}

impl MessageChannel {
    /// Create a channel holding up to `capacity` frames, returning it with
    /// its owning producer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (Arc<Self>, Producer<Owner>) {
        let (tx, rx) = mpsc::channel(capacity);
        let channel = Arc::new(Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
        });
        let owner = Producer::new(&channel);
        (channel, owner)
    }

    /// Create a non-owning producer handle.
    pub fn participant(&self) -> Producer<Participant> {
        Producer::new(self)
    }

    /// Wait for exclusive access to the receiving half.
    pub async fn consumer(&self) -> Consumer {
        let rx = self.rx.clone().lock_owned().await;
        Consumer {
            rx,
            closed: self.closed.clone(),
        }
    }

    /// Take the receiving half only if no other consumer holds it.
    pub fn try_consumer(&self) -> Option<Consumer> {
        let rx = self.rx.clone().try_lock_owned().ok()?;
        Some(Consumer {
            rx,
            closed: self.closed.clone(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Frames currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Enqueuing end of a [`MessageChannel`], tagged with its role.
pub struct Producer<R: Role> {
    tx: mpsc::Sender<Frame>,
    closed: CancellationToken,
    _role: PhantomData<R>,
}

impl<R: Role> Producer<R> {
    fn new(channel: &MessageChannel) -> Self {
        Self {
            tx: channel.tx.clone(),
            closed: channel.closed.clone(),
            _role: PhantomData,
        }
    }

    /// Enqueue a frame, waiting while the channel is full.
    pub async fn send(&self, frame: Frame) -> Result<(), ChannelClosed> {
        if self.closed.is_cancelled() {
            return Err(ChannelClosed);
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(ChannelClosed),
            res = self.tx.send(frame) => res.map_err(|_| ChannelClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Release the producer after its read loop ended. The owner closes the
    /// channel; a participant leaves it open. Dropping the producer has the
    /// same effect.
    pub fn finish(self) {
        drop(self);
    }
}

impl<R: Role> Drop for Producer<R> {
    fn drop(&mut self) {
        if R::CLOSES_ON_FINISH {
            self.closed.cancel();
        }
    }
}

impl Producer<Owner> {
    /// Close the channel. Queued frames remain available to the consumer.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// Exclusive draining end of a [`MessageChannel`].
pub struct Consumer {
    rx: OwnedMutexGuard<mpsc::Receiver<Frame>>,
    closed: CancellationToken,
}

impl Consumer {
    /// Next frame in FIFO order. Returns `None` once the channel is closed
    /// and fully drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn fifo_order() {
        let (channel, owner) = MessageChannel::new(8);
        let mut consumer = channel.consumer().await;

        owner.send(Frame::binary(vec![0x01, 0x02])).await.unwrap();
        owner.send(Frame::text("hi")).await.unwrap();
        assert_eq!(channel.len(), 2);

        assert_eq!(consumer.recv().await, Some(Frame::binary(vec![0x01, 0x02])));
        assert_eq!(consumer.recv().await, Some(Frame::text("hi")));
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn close_drains_then_ends() {
        let (channel, owner) = MessageChannel::new(4);
        owner.send(Frame::text("a")).await.unwrap();
        owner.send(Frame::text("b")).await.unwrap();
        owner.close();

        assert!(channel.is_closed());
        assert_eq!(owner.send(Frame::text("c")).await, Err(ChannelClosed));

        let mut consumer = channel.consumer().await;
        assert_eq!(consumer.recv().await, Some(Frame::text("a")));
        assert_eq!(consumer.recv().await, Some(Frame::text("b")));
        assert_eq!(consumer.recv().await, None);
        assert_eq!(consumer.recv().await, None);
    }

    #[tokio::test]
    async fn double_close_is_harmless() {
        let (channel, owner) = MessageChannel::new(1);
        owner.close();
        owner.close();
        owner.finish();
        assert!(channel.is_closed());
        let mut consumer = channel.consumer().await;
        assert_eq!(consumer.recv().await, None);
    }

    #[tokio::test]
    async fn participant_finish_keeps_channel_open() {
        let (channel, _owner) = MessageChannel::new(2);
        let participant = channel.participant();
        participant.send(Frame::text("x")).await.unwrap();
        participant.finish();
        assert!(!channel.is_closed());

        let next = channel.participant();
        next.send(Frame::text("y")).await.unwrap();

        let mut consumer = channel.consumer().await;
        assert_eq!(consumer.recv().await, Some(Frame::text("x")));
        assert_eq!(consumer.recv().await, Some(Frame::text("y")));
    }

    #[tokio::test]
    async fn owner_finish_closes() {
        let (channel, owner) = MessageChannel::new(2);
        let participant = channel.participant();
        owner.finish();
        assert!(channel.is_closed());
        assert!(participant.is_closed());
        assert_eq!(participant.send(Frame::text("late")).await, Err(ChannelClosed));
    }

    #[tokio::test]
    async fn dropped_owner_closes() {
        let (channel, owner) = MessageChannel::new(2);
        owner.send(Frame::text("queued")).await.unwrap();
        drop(owner);

        assert!(channel.is_closed());
        let mut consumer = channel.consumer().await;
        assert_eq!(consumer.recv().await, Some(Frame::text("queued")));
        assert_eq!(consumer.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_participant_keeps_channel_open() {
        let (channel, _owner) = MessageChannel::new(2);
        drop(channel.participant());
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn full_channel_applies_backpressure() {
        let (channel, owner) = MessageChannel::new(1);
        owner.send(Frame::text("1")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), owner.send(Frame::text("2")));
        assert!(blocked.await.is_err(), "send should wait for capacity");

        let mut consumer = channel.consumer().await;
        assert_eq!(consumer.recv().await, Some(Frame::text("1")));
        owner.send(Frame::text("3")).await.unwrap();
        assert_eq!(consumer.recv().await, Some(Frame::text("3")));
    }

    #[tokio::test]
    async fn close_releases_blocked_sender() {
        let (_channel, owner) = MessageChannel::new(1);
        let owner = Arc::new(owner);
        owner.send(Frame::text("fill")).await.unwrap();

        let sender = owner.clone();
        let pending = tokio::spawn(async move { sender.send(Frame::text("wait")).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        owner.close();

        assert_eq!(pending.await.unwrap(), Err(ChannelClosed));
    }

    #[tokio::test]
    async fn try_consumer_fails_while_held() {
        let (channel, _owner) = MessageChannel::new(1);
        let held = channel.try_consumer().unwrap();
        assert!(channel.try_consumer().is_none());
        drop(held);
        assert!(channel.try_consumer().is_some());
    }

    #[tokio::test]
    async fn single_consumer_at_a_time() {
        let (channel, owner) = MessageChannel::new(4);
        let first = channel.consumer().await;

        let second = tokio::time::timeout(Duration::from_millis(50), channel.consumer());
        assert!(second.await.is_err(), "second consumer must wait");

        drop(first);
        owner.send(Frame::text("resume")).await.unwrap();
        let mut second = channel.consumer().await;
        assert_eq!(second.recv().await, Some(Frame::text("resume")));
    }
}
