//! Interrupt info payloads.
//!
//! Info payloads are stored as tagged JSON envelopes so a checkpoint can be
//! reloaded in another process. Each envelope also carries the rendered
//! prompt, which lets a presentation layer show it without knowing the type.

use crate::error::AgentError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

/// A human-describable value attached to a suspension point.
pub trait InterruptPayload: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// Stable type tag written into checkpoints. Never change it once shipped.
    const TAG: &'static str;

    /// Prompt text shown to whoever resolves the interrupt.
    fn describe(&self) -> String;
}

/// Type-erased payload produced by [`PayloadRegistry::decode`].
pub trait ErasedPayload: Debug + Send + Sync {
    fn tag(&self) -> &'static str;
    fn render(&self) -> String;
    fn as_any(&self) -> &dyn Any;
}

impl<P: InterruptPayload> ErasedPayload for P {
    fn tag(&self) -> &'static str {
        P::TAG
    }

    fn render(&self) -> String {
        self.describe()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    pub tag: String,
    pub description: String,
    pub body: serde_json::Value,
}

impl PayloadEnvelope {
    pub fn wrap<P: InterruptPayload>(payload: &P) -> Result<Self, AgentError> {
        Ok(Self {
            tag: P::TAG.to_string(),
            description: payload.describe(),
            body: serde_json::to_value(payload)?,
        })
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    pub fn is<P: InterruptPayload>(&self) -> bool {
        self.tag == P::TAG
    }

    /// Decode into a concrete payload type, checking the tag first.
    pub fn decode<P: InterruptPayload>(&self) -> Result<P, AgentError> {
        if !self.is::<P>() {
            return Err(AgentError::Serialization(format!(
                "payload tag mismatch: expected '{}', got '{}'",
                P::TAG,
                self.tag
            )));
        }
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Plain text prompt for one-off interrupts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPrompt(pub String);

impl InterruptPayload for TextPrompt {
    const TAG: &'static str = "text_prompt";

    fn describe(&self) -> String {
        self.0.clone()
    }
}

type Decoder = fn(&serde_json::Value) -> Result<Box<dyn ErasedPayload>, serde_json::Error>;

fn decode_as<P: InterruptPayload>(
    value: &serde_json::Value,
) -> Result<Box<dyn ErasedPayload>, serde_json::Error> {
    let payload: P = serde_json::from_value(value.clone())?;
    Ok(Box::new(payload))
}

/// Maps stable type tags to decoders for polymorphic payloads.
pub struct PayloadRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl PayloadRegistry {
    /// Registry with the built-in [`TextPrompt`] payload.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<TextPrompt>();
        registry
    }

    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register<P: InterruptPayload>(&mut self) -> &mut Self {
        self.decoders.insert(P::TAG, decode_as::<P>);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.decoders.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn decode(&self, envelope: &PayloadEnvelope) -> Result<Box<dyn ErasedPayload>, AgentError> {
        let decoder = self.decoders.get(envelope.tag.as_str()).ok_or_else(|| {
            AgentError::Serialization(format!("unregistered payload tag: {}", envelope.tag))
        })?;
        Ok(decoder(&envelope.body)?)
    }
}

impl Default for PayloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Confirm {
        what: String,
    }

    impl InterruptPayload for Confirm {
        const TAG: &'static str = "test_confirm";

        fn describe(&self) -> String {
            format!("confirm {}?", self.what)
        }
    }

    #[test]
    fn test_envelope_keeps_description() {
        let env = PayloadEnvelope::wrap(&Confirm { what: "deploy".into() }).unwrap();
        assert_eq!(env.tag, "test_confirm");
        assert_eq!(env.describe(), "confirm deploy?");
        assert_eq!(env.decode::<Confirm>().unwrap().what, "deploy");
    }

    #[test]
    fn test_decode_rejects_wrong_tag() {
        let env = PayloadEnvelope::wrap(&TextPrompt("hello".into())).unwrap();
        assert!(env.decode::<Confirm>().is_err());
    }

    #[test]
    fn test_registry_decodes_by_tag() {
        let mut registry = PayloadRegistry::new();
        registry.register::<Confirm>();

        let env = PayloadEnvelope::wrap(&Confirm { what: "x".into() }).unwrap();
        let erased = registry.decode(&env).unwrap();
        assert_eq!(erased.tag(), "test_confirm");
        assert_eq!(erased.render(), "confirm x?");
        assert!(erased.as_any().downcast_ref::<Confirm>().is_some());
    }

    #[test]
    fn test_registry_unknown_tag() {
        let registry = PayloadRegistry::new();
        let env = PayloadEnvelope {
            tag: "missing".into(),
            description: String::new(),
            body: serde_json::Value::Null,
        };
        assert!(!registry.contains("missing"));
        assert!(registry.decode(&env).is_err());
    }
}
