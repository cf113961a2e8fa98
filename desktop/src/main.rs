use dioxus::prelude::*;

fn main() {
    if let Err(e) = dioxus_logger::init(dioxus_logger::tracing::Level::INFO) {
        eprintln!("failed to init logger: {e}");
    }
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    ui::App()
}
