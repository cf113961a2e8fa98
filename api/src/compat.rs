// Re-export the public API from the appropriate module
#[cfg(target_arch = "wasm32")]
pub use wasm32::*;

#[cfg(not(target_arch = "wasm32"))]
pub use non_wasm32::*;

/// `Send` where the executor needs it: everywhere but the browser, whose
/// executor is single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// Seconds since the unix epoch, from the browser clock on wasm32.
pub fn unix_now() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(target_arch = "wasm32")]
pub mod wasm32 {
    use std::{future::Future, time::Duration};

    use futures::future::{select, Either};

    pub mod interval {
        use std::time::Duration;
        use tokio::sync::mpsc;

        pub struct Interval {
            inner: Option<gloo_timers::callback::Interval>,
            rx: mpsc::UnboundedReceiver<()>,
            first: bool,
        }

        impl Interval {
            pub fn new(duration: Duration) -> Self {
                let (tx, rx) = mpsc::unbounded_channel();
                let gloo_interval =
                    gloo_timers::callback::Interval::new(duration.as_millis() as u32, move || {
                        let _ = tx.send(());
                    });

                Self {
                    inner: Some(gloo_interval),
                    rx,
                    first: true,
                }
            }

            /// Completes immediately the first time, like tokio's interval.
            pub async fn tick(&mut self) {
                if std::mem::take(&mut self.first) {
                    return;
                }
                let _ = self.rx.recv().await;
            }
        }

        impl Drop for Interval {
            fn drop(&mut self) {
                if let Some(inner) = self.inner.take() {
                    inner.cancel();
                }
            }
        }
    }

    pub async fn sleep(duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }

    /// Runs `fut` to completion on the browser's event loop.
    pub fn spawn<F>(fut: F)
    where
        F: Future<Output = ()> + super::MaybeSend + 'static,
    {
        wasm_bindgen_futures::spawn_local(fut);
    }

    /// Returns `None` if `fut` did not finish within `duration`.
    pub async fn timeout<F: Future>(duration: Duration, fut: F) -> Option<F::Output> {
        let fut = std::pin::pin!(fut);
        let timer = std::pin::pin!(gloo_timers::future::sleep(duration));
        match select(fut, timer).await {
            Either::Left((value, _)) => Some(value),
            Either::Right(_) => None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod non_wasm32 {
    use std::{future::Future, time::Duration};

    pub mod interval {
        use tokio::time::{self, Duration, MissedTickBehavior};
        pub struct Interval {
            inner: tokio::time::Interval,
        }
        impl Interval {
            pub fn new(duration: Duration) -> Self {
                let mut interval = time::interval(duration);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Self { inner: interval }
            }
            pub async fn tick(&mut self) {
                self.inner.tick().await;
            }
        }
    }

    pub async fn sleep(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    pub fn spawn<F>(fut: F)
    where
        F: Future<Output = ()> + super::MaybeSend + 'static,
    {
        tokio::spawn(fut);
    }

    pub async fn timeout<F: Future>(duration: Duration, fut: F) -> Option<F::Output> {
        tokio::time::timeout(duration, fut).await.ok()
    }
}
