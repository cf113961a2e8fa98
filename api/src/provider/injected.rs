//! The browser wallet injected at `window.ethereum` (EIP-1193).

use std::str::FromStr;

use alloy_primitives::{Address, U64};
use dioxus_logger::tracing::warn;
use js_sys::{Function, JSON, Object, Promise, Reflect};
use serde_json::Value;
use tokio::sync::broadcast;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::{ChainProvider, ProviderEvent};
use crate::error::{ChainError, ChainResult};

pub struct InjectedProvider {
    events: broadcast::Sender<ProviderEvent>,
}

impl InjectedProvider {
    /// Hooks the injected wallet's change notifications.
    ///
    /// Without an installed extension the provider is still usable: every
    /// request fails with [`ChainError::NoWallet`].
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        match ethereum() {
            Ok(ethereum) => {
                if let Err(e) = hook_events(&ethereum, &events) {
                    warn!("could not subscribe to wallet notifications: {e}");
                }
            }
            Err(_) => warn!("no injected wallet found"),
        }
        Self { events }
    }
}

impl Default for InjectedProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn hook_events(
    ethereum: &JsValue,
    events: &broadcast::Sender<ProviderEvent>,
) -> ChainResult<()> {
    let tx = events.clone();
    listen(ethereum, "chainChanged", move |value: JsValue| {
        let id = value
            .as_string()
            .and_then(|s| U64::from_str(&s).ok())
            .map(|id| id.to::<u64>())
            .or_else(|| value.as_f64().map(|n| n as u64));
        if let Some(id) = id {
            let _ = tx.send(ProviderEvent::ChainChanged(id));
        }
    })?;

    let tx = events.clone();
    listen(ethereum, "accountsChanged", move |value: JsValue| {
        let accounts = js_sys::Array::from(&value)
            .iter()
            .filter_map(|a| a.as_string())
            .filter_map(|a| Address::from_str(&a).ok())
            .collect();
        let _ = tx.send(ProviderEvent::AccountsChanged(accounts));
    })
}

#[async_trait::async_trait(?Send)]
impl ChainProvider for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let ethereum = ethereum()?;

        let args = Object::new();
        Reflect::set(&args, &"method".into(), &method.into()).map_err(js_error)?;
        let params = JSON::parse(&params.to_string()).map_err(js_error)?;
        Reflect::set(&args, &"params".into(), &params).map_err(js_error)?;

        let request: Function = Reflect::get(&ethereum, &"request".into())
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| ChainError::NoWallet)?;
        let promise: Promise = request
            .call1(&ethereum, &args)
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| ChainError::Transport("request did not return a promise".into()))?;

        let value = JsFuture::from(promise).await.map_err(js_error)?;
        if value.is_undefined() || value.is_null() {
            return Ok(Value::Null);
        }
        let text: String = JSON::stringify(&value).map_err(js_error)?.into();
        Ok(serde_json::from_str(&text)?)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

fn ethereum() -> ChainResult<JsValue> {
    let window = web_sys::window().ok_or(ChainError::NoWallet)?;
    let ethereum =
        Reflect::get(&window, &JsValue::from_str("ethereum")).map_err(|_| ChainError::NoWallet)?;
    if ethereum.is_undefined() || ethereum.is_null() {
        Err(ChainError::NoWallet)
    } else {
        Ok(ethereum)
    }
}

fn listen(
    ethereum: &JsValue,
    event: &str,
    handler: impl FnMut(JsValue) + 'static,
) -> ChainResult<()> {
    let on: Function = Reflect::get(ethereum, &"on".into())
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| ChainError::NoWallet)?;
    let closure = Closure::<dyn FnMut(JsValue)>::new(handler);
    on.call2(
        ethereum,
        &JsValue::from_str(event),
        closure.as_ref().unchecked_ref(),
    )
    .map_err(js_error)?;
    // the wallet holds the listener for the lifetime of the page
    closure.forget();
    Ok(())
}

/// Converts a rejected EIP-1193 promise (`{ code, message }`) into the
/// taxonomy.
fn js_error(err: JsValue) -> ChainError {
    let code = Reflect::get(&err, &"code".into())
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64);
    let message = Reflect::get(&err, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"));
    match code {
        Some(code) => ChainError::from_rpc(code, message),
        None => ChainError::Transport(message),
    }
}
