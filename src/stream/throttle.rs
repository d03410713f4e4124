//! Stream throttling for renderer subscriptions

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep, sleep};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// The first item passes straight through. Items arriving while the
    /// period is running replace each other, and the newest one is emitted
    /// when the period ends. When the inner stream ends, a held item is still
    /// delivered before the throttled stream ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Latest-wins rate limiter, see [`ThrottleExt::throttle`]
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        cooldown: Sleep,
        period: Duration,
        held: Option<S::Item>,
        cooling: bool,
        exhausted: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        Self {
            stream,
            cooldown: sleep(Duration::ZERO),
            period,
            held: None,
            cooling: false,
            exhausted: false,
        }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Pull everything that is ready, keeping only the newest item
        while !*this.exhausted {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.held = Some(item),
                Poll::Ready(None) => *this.exhausted = true,
                Poll::Pending => break,
            }
        }

        if *this.cooling {
            if this.cooldown.as_mut().poll(cx).is_pending() {
                return Poll::Pending;
            }
            *this.cooling = false;
        }

        match this.held.take() {
            Some(item) => {
                let deadline = Instant::now() + *this.period;
                this.cooldown.as_mut().reset(deadline);
                *this.cooling = true;
                Poll::Ready(Some(item))
            }
            None if *this.exhausted => Poll::Ready(None),
            None => Poll::Pending,
        }
    }
}
