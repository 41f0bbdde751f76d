//! Declarative page description used to seed [`super::MemoryDom`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sitehook_core_types::Rect;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageFixture {
    pub url: String,
    /// Children of `<body>`.
    #[serde(default)]
    pub body: Vec<ElementSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Form-field value; `textarea` and `input` default to an empty value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Layout box; omitted means a visible default box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

pub const DEFAULT_RECT: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 120.0,
    height: 32.0,
};

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn hidden(self) -> Self {
        self.rect(Rect::default())
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn is_form_field(&self) -> bool {
        matches!(self.tag.to_ascii_lowercase().as_str(), "textarea" | "input")
    }
}
