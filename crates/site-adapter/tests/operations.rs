mod common;

use common::{chat_page, page, Harness, CHAT_URL};
use site_adapter::dom::ElementSpec;
use site_adapter::ports::{DomEvent, KeyPhase};
use site_adapter::{FailureKind, HostEvent, SubmitMethod};
use sitehook_core_types::Rect;

fn completed(events: &[HostEvent], tool: &str) -> Option<serde_json::Value> {
    events.iter().find_map(|e| match e {
        HostEvent::ToolCompleted(p) if p.tool_name == tool => Some(p.result.clone()),
        _ => None,
    })
}

fn failed(events: &[HostEvent], tool: &str) -> Option<(FailureKind, String)> {
    events.iter().find_map(|e| match e {
        HostEvent::ToolFailed(p) if p.tool_name == tool => Some((p.kind, p.error.clone())),
        _ => None,
    })
}

fn enter_sequence() -> Vec<DomEvent> {
    vec![
        DomEvent::enter(KeyPhase::Keydown),
        DomEvent::enter(KeyPhase::Keypress),
        DomEvent::enter(KeyPhase::Keyup),
    ]
}

#[tokio::test]
async fn insert_into_empty_input_yields_exactly_the_text() {
    let mut h = Harness::new(chat_page());
    let prompt = h.dom.find_first("#prompt").unwrap();

    assert!(h.adapter.insert_text("B", None).await);
    assert_eq!(h.dom.content_of(prompt).as_deref(), Some("B"));
    assert_eq!(h.dom.focused(), Some(prompt));

    let events = h.dom.dispatched_to(prompt);
    assert_eq!(events, vec![DomEvent::insert_text("B"), DomEvent::Change]);

    let result = completed(&h.drain(), "insertText").expect("completion event");
    assert_eq!(result["originalLength"], 0);
    assert_eq!(result["newLength"], 1);
    assert_eq!(result["method"], "insertText");
}

#[tokio::test]
async fn insert_appends_after_a_blank_line() {
    let h = Harness::new(chat_page());
    let prompt = h.dom.find_first("#prompt").unwrap();
    h.dom.set_value(prompt, "A").unwrap();

    let report = h.adapter.try_insert_text("B", None).await.unwrap();
    assert_eq!(h.dom.content_of(prompt).as_deref(), Some("A\n\nB"));
    assert_eq!(report.original_length, 1);
    assert_eq!(report.new_length, 4);
}

#[tokio::test]
async fn insert_into_contenteditable_uses_text_content() {
    let h = Harness::new(page(
        CHAT_URL,
        vec![ElementSpec::new("div")
            .class("ProseMirror")
            .attr("contenteditable", "true")
            .child(ElementSpec::new("p").text("draft"))],
    ));
    let editor = h.dom.find_first("div.ProseMirror").unwrap();

    let report = h.adapter.try_insert_text("hello", None).await.unwrap();
    assert_eq!(report.target, editor);
    assert_eq!(h.dom.content_of(editor).as_deref(), Some("draft\n\nhello"));
}

#[tokio::test]
async fn selectors_are_tried_in_declared_order() {
    // The contenteditable comes first in the document, but the textarea
    // selector is listed first.
    let h = Harness::new(page(
        CHAT_URL,
        vec![
            ElementSpec::new("div").attr("contenteditable", "true"),
            ElementSpec::new("textarea")
                .id("prompt")
                .attr("placeholder", "Ask anything"),
        ],
    ));
    let prompt = h.dom.find_first("#prompt").unwrap();

    let report = h.adapter.try_insert_text("hi", None).await.unwrap();
    assert_eq!(report.target, prompt);
}

#[tokio::test]
async fn explicit_target_bypasses_selectors() {
    let h = Harness::new(page(
        CHAT_URL,
        vec![
            ElementSpec::new("textarea").id("prompt"),
            ElementSpec::new("input").id("search"),
        ],
    ));
    let search = h.dom.find_first("#search").unwrap();

    let report = h.adapter.try_insert_text("query", Some(search)).await.unwrap();
    assert_eq!(report.target, search);
    assert_eq!(h.dom.content_of(search).as_deref(), Some("query"));
}

#[tokio::test]
async fn missing_input_reports_element_not_found() {
    let mut h = Harness::new(page(CHAT_URL, vec![ElementSpec::new("main")]));

    assert!(!h.adapter.insert_text("hello", None).await);
    let (kind, error) = failed(&h.drain(), "insertText").expect("failure event");
    assert_eq!(kind, FailureKind::ElementNotFound);
    assert!(error.contains("chat input"));
}

#[tokio::test]
async fn visible_enabled_button_is_clicked() {
    let mut h = Harness::new(chat_page());
    let send = h.dom.find_first("#send").unwrap();

    assert!(h.adapter.submit_form().await);
    assert_eq!(h.dom.clicks(), vec![send]);

    let result = completed(&h.drain(), "submitForm").expect("completion event");
    assert_eq!(result["method"], "button.click");
}

#[tokio::test]
async fn hidden_button_falls_back_to_enter_without_click() {
    let h = Harness::new(chat_page());
    let send = h.dom.find_first("#send").unwrap();
    let prompt = h.dom.find_first("#prompt").unwrap();
    h.dom.set_rect(send, Rect::new(10.0, 10.0, 0.0, 0.0)).unwrap();

    let report = h.adapter.try_submit_form().await.unwrap();
    assert_eq!(report.method, SubmitMethod::EnterKey);
    assert_eq!(report.target, prompt);
    assert!(h.dom.clicks().is_empty());
    assert_eq!(h.dom.dispatched_to(prompt), enter_sequence());
    assert_eq!(h.dom.focused(), Some(prompt));
}

#[tokio::test]
async fn disabled_buttons_fall_back_to_enter_without_click() {
    for (name, value) in [("disabled", ""), ("aria-disabled", "true")] {
        let h = Harness::new(chat_page());
        let send = h.dom.find_first("#send").unwrap();
        h.dom.set_attribute(send, name, value).unwrap();

        let report = h.adapter.try_submit_form().await.unwrap();
        assert_eq!(report.method, SubmitMethod::EnterKey, "{name}");
        assert!(h.dom.clicks().is_empty(), "{name}");

        h.dom.remove_attribute(send, name).unwrap();
        let report = h.adapter.try_submit_form().await.unwrap();
        assert_eq!(report.method, SubmitMethod::ButtonClick, "{name}");
        assert_eq!(h.dom.clicks(), vec![send], "{name}");
    }
}

#[tokio::test]
async fn unreadable_button_layout_falls_back_to_enter() {
    let mut h = Harness::new(chat_page());
    let send = h.dom.find_first("#send").unwrap();
    let prompt = h.dom.find_first("#prompt").unwrap();
    h.dom.fail_layout_on(send);

    assert!(h.adapter.submit_form().await);
    assert!(h.dom.clicks().is_empty());
    assert_eq!(h.dom.dispatched_to(prompt), enter_sequence());
    let result = completed(&h.drain(), "submitForm").expect("completion event");
    assert_eq!(result["method"], "enterKey");
}

#[tokio::test]
async fn aria_disabled_false_still_clicks() {
    let h = Harness::new(chat_page());
    let send = h.dom.find_first("#send").unwrap();
    h.dom.set_attribute(send, "aria-disabled", "false").unwrap();

    let report = h.adapter.try_submit_form().await.unwrap();
    assert_eq!(report.method, SubmitMethod::ButtonClick);
}

#[tokio::test]
async fn failing_click_falls_back_to_enter() {
    let mut h = Harness::new(chat_page());
    let send = h.dom.find_first("#send").unwrap();
    h.dom.fail_clicks_on(send);

    assert!(h.adapter.submit_form().await);
    let result = completed(&h.drain(), "submitForm").expect("completion event");
    assert_eq!(result["method"], "enterKey");
}

#[tokio::test]
async fn submit_without_button_or_input_fails() {
    let mut h = Harness::new(page(CHAT_URL, vec![ElementSpec::new("main")]));

    assert!(!h.adapter.submit_form().await);
    let (kind, _) = failed(&h.drain(), "submitForm").expect("failure event");
    assert_eq!(kind, FailureKind::ElementNotFound);
}

#[tokio::test]
async fn support_follows_the_current_hostname() {
    let h = Harness::new(chat_page());
    assert!(h.adapter.is_supported().await);

    h.dom.set_url("https://beta.chat.mistral.ai/c/1");
    assert!(h.adapter.is_supported().await);

    h.dom.set_url("https://mistral.ai/news");
    assert!(!h.adapter.is_supported().await);

    h.dom.set_url("about:blank");
    assert!(!h.adapter.is_supported().await);
}
