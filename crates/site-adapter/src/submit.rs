use sitehook_core_types::NodeId;
use tracing::{debug, warn};

use crate::errors::{AdapterError, AdapterResult};
use crate::insert::find_first_match;
use crate::model::{SubmitMethod, SubmitReport};
use crate::ports::{DomEvent, DomPort, KeyPhase};

/// A submit control is usable when it is laid out and not disabled.
///
/// A check that cannot be evaluated counts as unusable.
pub async fn button_usable(dom: &dyn DomPort, button: NodeId) -> bool {
    match check_button(dom, button).await {
        Ok(usable) => usable,
        Err(err) => {
            debug!(button = %button, error = %err, "submit button check failed");
            false
        }
    }
}

async fn check_button(dom: &dyn DomPort, button: NodeId) -> AdapterResult<bool> {
    let rect = dom.bounding_box(button).await?;
    if !rect.is_rendered() {
        debug!(button = %button, "submit button has no layout box");
        return Ok(false);
    }
    if dom.attribute(button, "disabled").await?.is_some() {
        debug!(button = %button, "submit button disabled");
        return Ok(false);
    }
    if dom.attribute(button, "aria-disabled").await?.as_deref() == Some("true") {
        debug!(button = %button, "submit button aria-disabled");
        return Ok(false);
    }
    Ok(true)
}

/// Submit through the send button, falling back to Enter on the chat input.
pub async fn submit_form(
    dom: &dyn DomPort,
    button_selectors: &[String],
    input_selectors: &[String],
) -> AdapterResult<SubmitReport> {
    let button = match find_first_match(dom, button_selectors).await {
        Ok(button) => button,
        Err(err) => {
            debug!(error = %err, "submit button lookup failed");
            None
        }
    };
    if let Some(button) = button {
        if button_usable(dom, button).await {
            match dom.click(button).await {
                Ok(()) => {
                    return Ok(SubmitReport {
                        method: SubmitMethod::ButtonClick,
                        target: button,
                    })
                }
                Err(err) => {
                    warn!(button = %button, error = %err, "submit click failed; using Enter key");
                }
            }
        }
    } else {
        debug!("no submit button matched; using Enter key");
    }
    press_enter(dom, input_selectors).await
}

/// Focus the chat input and send a full Enter keydown/keypress/keyup sequence.
pub async fn press_enter(
    dom: &dyn DomPort,
    input_selectors: &[String],
) -> AdapterResult<SubmitReport> {
    let input = find_first_match(dom, input_selectors)
        .await?
        .ok_or_else(|| AdapterError::ElementNotFound("chat input for Enter key".into()))?;
    dom.focus(input).await?;
    for phase in [KeyPhase::Keydown, KeyPhase::Keypress, KeyPhase::Keyup] {
        dom.dispatch(input, DomEvent::enter(phase)).await?;
    }
    Ok(SubmitReport {
        method: SubmitMethod::EnterKey,
        target: input,
    })
}
