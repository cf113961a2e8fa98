//! The handful of Pico.css components the mint screen is built from.
//! Requires the Pico stylesheet linked by the app root.

#![allow(non_snake_case)] // Allow PascalCase for component function names

use dioxus::prelude::*;

/// A centered `<main class="container">`.
#[component]
pub fn Container(children: Element) -> Element {
    rsx! { main { class: "container", {children} } }
}

/// An `<article>` card with an optional header line.
#[component]
pub fn Card(title: Option<String>, children: Element) -> Element {
    rsx! {
        article {
            if let Some(title) = title {
                header { strong { "{title}" } }
            }
            {children}
        }
    }
}

#[derive(PartialEq, Clone, Copy, Default)]
pub enum ButtonType {
    #[default]
    Primary,
    Secondary,
    Contrast,
}

impl ButtonType {
    fn class(self, outline: bool) -> &'static str {
        match (self, outline) {
            (ButtonType::Primary, false) => "",
            (ButtonType::Primary, true) => "outline",
            (ButtonType::Secondary, false) => "secondary",
            (ButtonType::Secondary, true) => "secondary outline",
            (ButtonType::Contrast, false) => "contrast",
            (ButtonType::Contrast, true) => "contrast outline",
        }
    }
}

#[derive(Props, PartialEq, Clone)]
pub struct ButtonProps {
    children: Element,
    #[props(optional)]
    on_click: Option<EventHandler<MouseEvent>>,
    #[props(default)]
    button_type: ButtonType,
    #[props(default = false)]
    outline: bool,
    #[props(default = false)]
    disabled: bool,
    /// Shows Pico's spinner and blocks clicks.
    #[props(default = false)]
    busy: bool,
}

pub fn Button(props: ButtonProps) -> Element {
    let class = props.button_type.class(props.outline);
    rsx! {
        button {
            class: "{class}",
            disabled: props.disabled || props.busy,
            "aria-busy": if props.busy { "true" } else { "false" },
            onclick: move |evt| {
                if let Some(handler) = &props.on_click {
                    handler.call(evt);
                }
            },
            {props.children}
        }
    }
}
