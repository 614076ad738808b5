use super::{CompletionError, CompletionModel, CompletionRequest, FinishReason, ModelReply};
use crate::types::{Message, ToolCallRequest};

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    ChatCompletionResponseStream, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason as OpenAiFinishReason, FunctionCall,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use tracing::debug;

#[derive(Debug)]
enum StreamPart {
    Content(String),
    ToolCall(ToolCallRequest),
    Finish(FinishReason),
}

type PartStream = Pin<Box<dyn Stream<Item = Result<StreamPart, CompletionError>> + Send>>;

/// Any OpenAI-compatible chat completions endpoint. Replies are streamed and
/// folded back into one [`ModelReply`].
pub struct OpenAiModel {
    inner: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    pub fn new(api_base: &str, api_key: &str, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key);
        Self {
            inner: Client::with_config(config),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn parse_stream(mut stream: ChatCompletionResponseStream) -> PartStream {
        Box::pin(stream! {
        let mut tool_calls: BTreeMap<u32, ToolCallRequest> = BTreeMap::new();
        while let Some(part) = stream.next().await {
          match part {
            Ok(part) => {
              let Some(first) = part.choices.first() else {
                  continue;
              };
              if let Some(content) = &first.delta.content {
                yield Ok(StreamPart::Content(content.clone()));
              }
              if let Some(calls) = &first.delta.tool_calls {
                for call in calls {
                  let partial = tool_calls.entry(call.index).or_default();
                  if let Some(id) = &call.id {
                    partial.id = id.clone();
                  }
                  if let Some(function) = &call.function {
                    if let Some(name) = &function.name {
                      partial.name.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                      partial.arguments.push_str(arguments);
                    }
                  }
                }
              }
              if let Some(reason) = &first.finish_reason {
                for (_, call) in std::mem::take(&mut tool_calls) {
                  yield Ok(StreamPart::ToolCall(call));
                }
                yield Ok(StreamPart::Finish(finish_reason(reason)));
              }
            },
            Err(error) => {
              yield Err(CompletionError::from(error));
              return;
            }
          }
        }
        for (_, call) in tool_calls {
          yield Ok(StreamPart::ToolCall(call));
        }
        })
    }

    async fn collect_reply(mut stream: PartStream) -> Result<ModelReply, CompletionError> {
        let mut reply = ModelReply::default();
        let mut content = String::new();
        let mut saw_part = false;
        while let Some(part) = stream.next().await {
            saw_part = true;
            match part? {
                StreamPart::Content(text) => content.push_str(&text),
                StreamPart::ToolCall(call) => reply.tool_calls.push(call),
                StreamPart::Finish(reason) => reply.finish_reason = reason,
            }
        }
        if !saw_part {
            return Err(CompletionError::NoChoices);
        }
        if !content.is_empty() {
            reply.content = Some(content);
        }
        Ok(reply)
    }
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelReply, CompletionError> {
        let messages: Vec<ChatCompletionRequestMessage> =
            request.messages.iter().map(Into::into).collect();
        let tools: Vec<ChatCompletionTool> = request.tools.iter().map(Into::into).collect();

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages).n(1);
        // some providers reject an empty tool list
        if !tools.is_empty() {
            args.tools(tools);
        }
        let request = args
            .build()
            .map_err(|err| CompletionError::Request(err.to_string()))?;

        debug!(model = %self.model, messages = request.messages.len(), "chat completion");
        let stream = self.inner.chat().create_stream(request).await?;
        Self::collect_reply(Self::parse_stream(stream)).await
    }
}

fn finish_reason(reason: &OpenAiFinishReason) -> FinishReason {
    match reason {
        OpenAiFinishReason::Stop => FinishReason::Stop,
        OpenAiFinishReason::ToolCalls => FinishReason::ToolCalls,
        OpenAiFinishReason::Length => FinishReason::Length,
        OpenAiFinishReason::ContentFilter => FinishReason::ContentFilter,
        OpenAiFinishReason::FunctionCall => FinishReason::Other,
    }
}

impl From<&Message> for ChatCompletionRequestMessage {
    fn from(value: &Message) -> Self {
        match value {
            Message::System { content } => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(content.clone()),
                    name: None,
                })
            }
            Message::User { content } => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(content.clone()),
                    name: None,
                })
            }
            Message::Assistant {
                content,
                tool_calls,
            } => ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: content
                    .clone()
                    .map(ChatCompletionRequestAssistantMessageContent::Text),
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                ..Default::default()
            }),
            Message::Tool {
                content,
                tool_call_id,
            } => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(content.clone()),
                tool_call_id: tool_call_id.clone(),
            }),
        }
    }
}
