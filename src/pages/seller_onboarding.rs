//! Seller onboarding: collect profile, pickup location and payout details,
//! then review and publish.
//!
//! The draft is loaded once by the profile page's initializer and shared with
//! the later pages through the workflow context.

use serde::{Deserialize, Serialize};

use crate::workflow::{PageDefinition, PageProps, PageView, WorkflowContext};
use crate::{wlog_debug, Result};

const DRAFT: &str = "seller.draft";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerDraft {
    pub shop_name: String,
    pub category: String,
    pub pickup_address: Option<String>,
    pub payout_account: Option<String>,
}

impl Default for SellerDraft {
    fn default() -> Self {
        Self {
            shop_name: "My Shop".to_string(),
            category: "General".to_string(),
            pickup_address: None,
            payout_account: None,
        }
    }
}

pub(super) fn pages(ctx: &WorkflowContext) -> Vec<PageDefinition> {
    vec![
        welcome(),
        profile(ctx.clone()),
        location(ctx.clone()),
        payout(ctx.clone()),
        review(ctx.clone()),
    ]
}

/// Load the saved draft, creating an empty one on first visit.
async fn load_draft(ctx: WorkflowContext) -> Result<()> {
    if ctx.get::<SellerDraft>(DRAFT).is_none() {
        wlog_debug!("No seller draft in context, starting a new one");
        ctx.set(DRAFT, SellerDraft::default())?;
    }
    Ok(())
}

fn draft(ctx: &WorkflowContext) -> SellerDraft {
    ctx.get(DRAFT).unwrap_or_default()
}

fn welcome() -> PageDefinition {
    PageDefinition::new("welcome", |props: &PageProps| {
        PageView::new("Become a seller")
            .line("List your products and reach buyers nearby.")
            .line("Setup takes four short steps.")
            .with_nav(props, "get started")
    })
}

fn profile(ctx: WorkflowContext) -> PageDefinition {
    let init_ctx = ctx.clone();
    PageDefinition::new("profile", move |props: &PageProps| {
        let view = PageView::new("Shop profile");
        let view = if props.is_initializing {
            view.line("Loading your draft...")
        } else {
            let d = draft(&ctx);
            view.line(format!("Shop name: {}", d.shop_name))
                .line(format!("Category:  {}", d.category))
        };
        view.with_nav(props, "next")
    })
    .with_initializer(move || load_draft(init_ctx.clone()))
}

fn location(ctx: WorkflowContext) -> PageDefinition {
    PageDefinition::new("location", move |props: &PageProps| {
        let d = draft(&ctx);
        PageView::new("Pickup location")
            .line(format!(
                "Address: {}",
                d.pickup_address.as_deref().unwrap_or("not set")
            ))
            .line("Buyers see this address after an order is placed.")
            .with_nav(props, "next")
    })
}

fn payout(ctx: WorkflowContext) -> PageDefinition {
    PageDefinition::new("payout", move |props: &PageProps| {
        let d = draft(&ctx);
        PageView::new("Payouts")
            .line(format!(
                "Account: {}",
                d.payout_account.as_deref().unwrap_or("not linked")
            ))
            .with_nav(props, "next")
    })
}

fn review(ctx: WorkflowContext) -> PageDefinition {
    PageDefinition::new("review", move |props: &PageProps| {
        let d = draft(&ctx);
        PageView::new("Review and publish")
            .line(format!("{} ({})", d.shop_name, d.category))
            .line(format!(
                "Pickup: {}",
                d.pickup_address.as_deref().unwrap_or("not set")
            ))
            .line(format!(
                "Payout: {}",
                d.payout_account.as_deref().unwrap_or("not linked")
            ))
            .blank()
            .line("Publishing makes your shop visible to buyers.")
            .with_nav(props, "publish")
    })
}
