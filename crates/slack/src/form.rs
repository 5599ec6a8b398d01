//! The legal request modal: its static schema and how submitted values are read back.

use std::collections::HashMap;

use intake_core::config::{FieldIdConfig, FormConfig};
use intake_core::domain::request::{
    value_or_placeholder, RequestType, NOT_AVAILABLE, NOT_SELECTED,
};
use serde::{Deserialize, Serialize};

use crate::blocks::{Block, InputElement, ModalView, OptionObject, TextObject};

/// `view.state.values`, keyed by block id then action id.
pub type ViewState = HashMap<String, HashMap<String, FieldValue>>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FieldValue {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldId {
    pub block_id: String,
    pub action_id: String,
}

impl From<&FieldIdConfig> for FieldId {
    fn from(value: &FieldIdConfig) -> Self {
        Self { block_id: value.block_id.clone(), action_id: value.action_id.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedFields {
    pub request_type: String,
    pub counterparty: String,
    pub description: String,
}

/// Carried through the modal so the submission knows where the command was typed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl FormMetadata {
    pub fn for_channel(channel_id: impl Into<String>) -> Self {
        Self { channel_id: Some(channel_id.into()) }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Unparseable metadata decodes to the empty value.
    pub fn decode(raw: Option<&str>) -> Self {
        raw.filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormDefinition {
    pub command: String,
    pub callback_id: String,
    pub request_type: FieldId,
    pub counterparty: FieldId,
    pub description: FieldId,
}

impl Default for FormDefinition {
    fn default() -> Self {
        Self::from_config(&intake_core::config::AppConfig::default().form)
    }
}

impl FormDefinition {
    pub fn from_config(form: &FormConfig) -> Self {
        Self {
            command: form.command.clone(),
            callback_id: form.callback_id.clone(),
            request_type: FieldId::from(&form.request_type),
            counterparty: FieldId::from(&form.counterparty),
            description: FieldId::from(&form.description),
        }
    }

    pub fn view(&self, metadata: &FormMetadata) -> ModalView {
        let options = RequestType::ALL
            .iter()
            .map(|request_type| OptionObject::new(request_type.as_str(), request_type.as_str()))
            .collect();

        ModalView {
            callback_id: self.callback_id.clone(),
            title: TextObject::plain("New Legal Request"),
            submit: TextObject::plain("Submit"),
            close: TextObject::plain("Cancel"),
            blocks: vec![
                Block::Input {
                    block_id: self.request_type.block_id.clone(),
                    label: TextObject::plain("Request Type"),
                    element: InputElement::StaticSelect {
                        action_id: self.request_type.action_id.clone(),
                        placeholder: TextObject::plain("Select a request type"),
                        options,
                    },
                    optional: false,
                },
                Block::Input {
                    block_id: self.counterparty.block_id.clone(),
                    label: TextObject::plain("Counterparty"),
                    element: InputElement::PlainTextInput {
                        action_id: self.counterparty.action_id.clone(),
                        placeholder: TextObject::plain("Enter counterparty name"),
                        multiline: false,
                    },
                    optional: false,
                },
                Block::Input {
                    block_id: self.description.block_id.clone(),
                    label: TextObject::plain("Description"),
                    element: InputElement::PlainTextInput {
                        action_id: self.description.action_id.clone(),
                        placeholder: TextObject::plain("Briefly describe the request"),
                        multiline: true,
                    },
                    optional: false,
                },
            ],
            private_metadata: metadata.channel_id.as_ref().map(|_| metadata.encode()),
        }
    }

    /// Never fails: missing values become placeholders.
    pub fn extract(&self, state: &ViewState) -> SubmittedFields {
        let request_type = lookup(state, &self.request_type).and_then(|field| {
            field.selected_option.as_ref().map(|option| option.value.as_str())
        });

        SubmittedFields {
            request_type: value_or_placeholder(request_type, NOT_SELECTED),
            counterparty: value_or_placeholder(
                lookup(state, &self.counterparty).and_then(|field| field.value.as_deref()),
                NOT_AVAILABLE,
            ),
            description: value_or_placeholder(
                lookup(state, &self.description).and_then(|field| field.value.as_deref()),
                NOT_AVAILABLE,
            ),
        }
    }
}

fn lookup<'a>(state: &'a ViewState, id: &FieldId) -> Option<&'a FieldValue> {
    state.get(&id.block_id).and_then(|actions| actions.get(&id.action_id))
}
