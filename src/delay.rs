use std::future::Future;

/// Timer seam for the type-ahead debounce.
pub trait Delay {
    fn sleep(&self, millis: u64) -> impl Future<Output = ()>;
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[cfg(not(target_arch = "wasm32"))]
impl Delay for TokioDelay {
    fn sleep(&self, millis: u64) -> impl Future<Output = ()> {
        tokio::time::sleep(std::time::Duration::from_millis(millis))
    }
}

/// `setTimeout`-backed delay for the browser, where tokio has no timer driver.
#[cfg(feature = "wasm")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutDelay;

#[cfg(feature = "wasm")]
impl Delay for TimeoutDelay {
    async fn sleep(&self, millis: u64) {
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().map(|window| {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(
                    &resolve,
                    millis.min(i32::MAX as u64) as i32,
                )
            });
            if !matches!(scheduled, Some(Ok(_))) {
                let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
            }
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }
}

/// Resolves immediately. Useful for headless callers that never debounce.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn sleep(&self, _millis: u64) -> impl Future<Output = ()> {
        std::future::ready(())
    }
}
