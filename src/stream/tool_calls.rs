use indexmap::IndexMap;

use crate::error::BridgeError;
use crate::protocol::openai_chat::{OpenAiToolCall, OpenAiToolCallFunction};
use crate::protocol::relay::ToolCall;

#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    arguments: String,
}

/// Rebuilds complete tool calls from streamed fragments.
///
/// A fragment with an id starts (or restarts) that call and makes it active;
/// a fragment without an id continues the active call's arguments.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: IndexMap<String, PendingCall>,
    active: Option<String>,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::OrphanFragment`] for a continuation that arrives
    /// before any call has been started.
    pub fn push(&mut self, fragment: &ToolCall) -> Result<(), BridgeError> {
        if fragment.id.is_empty() {
            let active = self
                .active
                .as_ref()
                .and_then(|id| self.calls.get_mut(id))
                .ok_or(BridgeError::OrphanFragment)?;
            active.arguments.push_str(fragment.arguments());
            return Ok(());
        }

        // A repeated id replaces the entry but keeps its first position.
        self.calls.insert(
            fragment.id.clone(),
            PendingCall {
                name: fragment.name().to_string(),
                arguments: fragment.arguments().to_string(),
            },
        );
        self.active = Some(fragment.id.clone());
        Ok(())
    }

    /// Apply every fragment of one partial reply, in order.
    ///
    /// # Errors
    ///
    /// See [`ToolCallAccumulator::push`].
    pub fn extend<'a>(
        &mut self,
        fragments: impl IntoIterator<Item = &'a ToolCall>,
    ) -> Result<(), BridgeError> {
        fragments.into_iter().try_for_each(|fragment| self.push(fragment))
    }

    /// Completed calls in first-seen order.
    #[must_use]
    pub fn finish(self) -> Vec<OpenAiToolCall> {
        self.calls
            .into_iter()
            .map(|(id, call)| OpenAiToolCall {
                id,
                type_: "function".to_string(),
                function: OpenAiToolCallFunction {
                    name: call.name,
                    arguments: call.arguments,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::relay::ToolCallFunction;

    fn fragment(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            r#type: "function".to_string(),
            function: Some(ToolCallFunction {
                name: name.to_string(),
                arguments: arguments.to_string(),
            }),
        }
    }

    #[test]
    fn test_continuations_append_to_active_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment("call_a", "get_weather", "{\"city\":"))
            .expect("start");
        acc.push(&fragment("", "", "\"Paris\"}")).expect("continue");

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].type_, "function");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Paris\"}");
    }

    #[test]
    fn test_calls_keep_first_insertion_order() {
        let mut acc = ToolCallAccumulator::new();
        acc.extend(&[
            fragment("call_a", "first", "{"),
            fragment("call_b", "second", "{}"),
            fragment("call_a", "first", "{\"x\":1}"),
            fragment("", "", "  "),
        ])
        .expect("fragments");

        let calls = acc.finish();
        let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["call_a", "call_b"]);
        assert_eq!(calls[0].function.arguments, "{\"x\":1}  ");
        assert_eq!(calls[1].function.arguments, "{}");
    }

    #[test]
    fn test_orphan_fragment_fails() {
        let mut acc = ToolCallAccumulator::new();
        let err = acc.push(&fragment("", "", "{}")).unwrap_err();
        assert!(matches!(err, BridgeError::OrphanFragment));
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn test_fragment_without_function_body() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCall {
            id: "call_z".to_string(),
            r#type: String::new(),
            function: None,
        })
        .expect("start");
        let calls = acc.finish();
        assert_eq!(calls[0].function.name, "");
        assert_eq!(calls[0].function.arguments, "");
    }
}
