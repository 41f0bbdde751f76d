//! Insertion-point discovery and popover container management.

use std::sync::Arc;

use sitehook_core_types::NodeId;
use tracing::debug;

use crate::config::{PopoverConfig, SiteProfile};
use crate::errors::{AdapterError, AdapterResult};
use crate::insert::find_first_match;
use crate::model::InsertionPoint;
use crate::poll::{poll_until, Clock, PollOutcome, PollPolicy};
use crate::ports::{DomPort, PopoverRenderer};
use crate::toggle::ToggleStateManager;

/// Where the popover should go on the page as it is right now.
///
/// With a chat input: its enclosing form (else its parent), after the last
/// button in there. Without one: `main` (else `body`), appended at the end.
pub async fn find_insertion_point(
    dom: &dyn DomPort,
    profile: &SiteProfile,
) -> AdapterResult<Option<InsertionPoint>> {
    if let Some(input) = find_first_match(dom, &profile.chat_input_selectors).await? {
        let container = match dom.closest(input, "form").await? {
            Some(form) => Some(form),
            None => dom.parent(input).await?,
        };
        if let Some(container) = container {
            let anchor = dom
                .query_selector_all(Some(container), "button")
                .await?
                .last()
                .copied();
            return Ok(Some(InsertionPoint { container, anchor }));
        }
    }
    let container = match dom.query_selector(None, "main").await? {
        Some(main) => main,
        None => dom.body().await?,
    };
    Ok(Some(InsertionPoint {
        container,
        anchor: None,
    }))
}

/// Poll for an insertion point until the page settles.
pub async fn wait_for_page_ready(
    dom: &dyn DomPort,
    profile: &SiteProfile,
    clock: &dyn Clock,
    policy: &PollPolicy,
) -> PollOutcome<InsertionPoint> {
    poll_until(clock, policy, |attempt| async move {
        match find_insertion_point(dom, profile).await {
            Ok(point) => point,
            Err(err) => {
                debug!(attempt, error = %err, "insertion point probe failed");
                None
            }
        }
    })
    .await
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InjectOutcome {
    Mounted(NodeId),
    AlreadyPresent(NodeId),
    NoInsertionPoint,
}

/// One injection attempt against a fresh DOM snapshot.
pub async fn try_inject(
    dom: &dyn DomPort,
    renderer: &dyn PopoverRenderer,
    bridge: &Arc<ToggleStateManager>,
    profile: &SiteProfile,
    popover: &PopoverConfig,
) -> AdapterResult<InjectOutcome> {
    if let Some(existing) = dom.element_by_id(&popover.container_id).await? {
        return Ok(InjectOutcome::AlreadyPresent(existing));
    }
    let Some(point) = find_insertion_point(dom, profile).await? else {
        return Ok(InjectOutcome::NoInsertionPoint);
    };
    let container = mount_popover(dom, renderer, bridge, popover, point).await?;
    Ok(InjectOutcome::Mounted(container))
}

/// Create the container at `point` and render the popover into it.
///
/// A container whose render failed is removed again so the next attempt starts clean.
pub async fn mount_popover(
    dom: &dyn DomPort,
    renderer: &dyn PopoverRenderer,
    bridge: &Arc<ToggleStateManager>,
    popover: &PopoverConfig,
    point: InsertionPoint,
) -> AdapterResult<NodeId> {
    let container = dom
        .create_element(
            "div",
            Some(popover.container_id.as_str()),
            Some(popover.container_style.as_str()),
        )
        .await?;
    match point.anchor {
        Some(anchor) => dom.insert_after(anchor, container).await?,
        None => dom.append_child(point.container, container).await?,
    }

    if let Err(err) = renderer.render(container, bridge.clone(), popover).await {
        if let Err(remove_err) = dom.remove(container).await {
            debug!(error = %remove_err, "failed to remove container after render error");
        }
        return Err(AdapterError::Render(err.to_string()));
    }
    Ok(container)
}

/// Unmount the rendered popover and drop its container, if present.
pub async fn unmount_popover(
    dom: &dyn DomPort,
    renderer: &dyn PopoverRenderer,
    popover: &PopoverConfig,
) -> AdapterResult<Option<NodeId>> {
    let Some(container) = dom.element_by_id(&popover.container_id).await? else {
        return Ok(None);
    };
    if let Err(err) = renderer.unmount(container).await {
        debug!(error = %err, "popover unmount failed");
    }
    dom.remove(container).await?;
    Ok(Some(container))
}
