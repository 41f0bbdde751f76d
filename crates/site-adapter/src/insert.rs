use sitehook_core_types::NodeId;
use tracing::debug;

use crate::errors::{AdapterError, AdapterResult};
use crate::model::{InsertReport, INSERT_METHOD};
use crate::ports::{DomEvent, DomPort};

/// First element matching `selectors`, tried in declared order.
pub async fn find_first_match(
    dom: &dyn DomPort,
    selectors: &[String],
) -> AdapterResult<Option<NodeId>> {
    for selector in selectors {
        if let Some(node) = dom.query_selector(None, selector).await? {
            debug!(selector = %selector, node = %node, "selector matched");
            return Ok(Some(node));
        }
    }
    Ok(None)
}

/// Content after inserting `text` below whatever the field already holds.
pub fn combine_content(existing: &str, text: &str) -> String {
    if existing.trim().is_empty() {
        text.to_string()
    } else {
        format!("{existing}\n\n{text}")
    }
}

/// Append `text` to the chat input the way a user typing would.
///
/// The page's own framework only notices `input`/`change` events, so the new
/// content goes through a select-all + `insertText` input event instead of a
/// direct value write.
pub async fn insert_text(
    dom: &dyn DomPort,
    selectors: &[String],
    text: &str,
    target: Option<NodeId>,
) -> AdapterResult<InsertReport> {
    let element = match target {
        Some(node) => node,
        None => find_first_match(dom, selectors)
            .await?
            .ok_or_else(|| AdapterError::ElementNotFound("chat input".into()))?,
    };

    let existing = dom.content(element).await?;
    let combined = combine_content(existing.as_str(), text);

    dom.focus(element).await?;
    dom.select_all(element).await?;
    dom.dispatch(element, DomEvent::insert_text(combined.clone()))
        .await?;
    dom.dispatch(element, DomEvent::Change).await?;

    Ok(InsertReport {
        target: element,
        original_length: existing.as_str().chars().count(),
        new_length: combined.chars().count(),
        method: INSERT_METHOD.to_string(),
    })
}
