//! Three-step demo: a plain page, a page with a slow initializer, and a finish page.

use std::time::Duration;

use chrono::Local;

use crate::workflow::{PageDefinition, PageProps, PageView, WorkflowContext};

const LOADED_AT: &str = "demo.loaded_at";
const LOAD_DELAY: Duration = Duration::from_millis(800);

pub(super) fn pages(ctx: &WorkflowContext) -> Vec<PageDefinition> {
    vec![intro(), loading(ctx.clone()), finish(ctx.clone())]
}

fn intro() -> PageDefinition {
    PageDefinition::new("intro", |props: &PageProps| {
        PageView::new("Welcome")
            .line("This workflow walks through three steps.")
            .line("Progress is saved each time you move forward,")
            .line("so you can quit and pick up where you left off.")
            .with_nav(props, "start")
    })
}

fn loading(ctx: WorkflowContext) -> PageDefinition {
    let render_ctx = ctx.clone();
    PageDefinition::new("loading", move |props: &PageProps| {
        let view = PageView::new("Fetching data");
        let view = if props.is_initializing {
            view.line("Loading, please wait...")
        } else {
            match render_ctx.get::<String>(LOADED_AT) {
                Some(at) => view.line(format!("Data loaded at {}.", at)),
                None => view.line("Data could not be loaded. You can still continue."),
            }
        };
        view.with_nav(props, "continue")
    })
    .with_initializer(move || {
        let ctx = ctx.clone();
        async move {
            tokio::time::sleep(LOAD_DELAY).await;
            ctx.set(LOADED_AT, Local::now().format("%H:%M:%S").to_string())
        }
    })
}

fn finish(ctx: WorkflowContext) -> PageDefinition {
    PageDefinition::new("finish", move |props: &PageProps| {
        let view = PageView::new("All done").line("Press finish to leave the workflow.");
        let view = if ctx.contains(LOADED_AT) {
            view.line("The data from the previous step is ready.")
        } else {
            view
        };
        view.with_nav(props, "finish")
    })
}
