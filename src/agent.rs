//! Agent invoker: routes a user prompt to the game or the LLM fallback
//!
//! Per-session routing:
//! - `Idle` + "yes"      -> start a game, reply with the move prompt
//! - `Idle` + anything   -> ask the LLM, normalize its reply envelope
//! - `InGame` + anything -> play a round with the prompt as the move
//!
//! The session lock is held for the whole invocation, delivery included, so
//! a user's replies go out in the order their messages were handled.

use crate::envelope::{self, Normalized, ResponseEnvelope};
use crate::game::{self, MoveSource};
use crate::gateway::MessageSink;
use crate::llm::{LlmRequest, LlmService};
use crate::session::{Phase, Session, SessionStore};
use std::sync::Arc;

pub const SYSTEM_INSTRUCTION: &str = r#"You are an AI Agent. YOU HAVE TO GIVE REPLY IN A SPECIFIC FORMAT and the format is:

{
  "message": "<your direct answer to the user prompt>",
  "function_call_used": <true | false>,
  "function_call": <function_name | null>
}

- Use function_call only if it's one of the following:
  - summarizeEndlessTransaction
  - summarizeSpecificAccountTransactions

- If none of the allowed function names apply, set:
  - "function_call_used": false
  - "function_call": null

- Always provide a relevant "message" for the user, even when a function_call is made.

- Also SEND ONLY JSON RESPONSE NOTHING ELSE"#;

pub const MOVE_PROMPT: &str =
    "Let's play rock-paper-scissors! First to 5 wins. Choose rock, paper, or scissors.";

pub const APOLOGY: &str = "Sorry, I couldn't come up with an answer right now. \
Want to play rock-paper-scissors instead? Reply \"yes\" to start.";

const START_GAME: &str = "yes";

const MAX_REPLY_TOKENS: u32 = 1024;

pub struct Agent {
    sessions: Arc<SessionStore>,
    llm: Arc<dyn LlmService>,
    sink: Arc<dyn MessageSink>,
    moves: Arc<dyn MoveSource>,
}

impl Agent {
    pub fn new(
        sessions: Arc<SessionStore>,
        llm: Arc<dyn LlmService>,
        sink: Arc<dyn MessageSink>,
        moves: Arc<dyn MoveSource>,
    ) -> Self {
        Self {
            sessions,
            llm,
            sink,
            moves,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer `prompt` for `user_id` and deliver the reply.
    ///
    /// Never fails: LLM and delivery errors are logged and replaced by a
    /// fallback reply.
    #[tracing::instrument(level = "info", skip_all, fields(user_id = %user_id))]
    pub async fn invoke(&self, prompt: &str, user_id: &str) -> ResponseEnvelope {
        tracing::info!(prompt, "Received prompt");
        let mut session = self.sessions.lock(user_id).await;

        let envelope = self.respond(&mut session, prompt).await;
        session.last_message.clone_from(&envelope.message);

        if let Err(e) = self.sink.send(user_id, &envelope.message).await {
            tracing::error!(error = %e, "Failed to deliver reply");
        }

        envelope
    }

    async fn respond(&self, session: &mut Session, prompt: &str) -> ResponseEnvelope {
        match session.phase {
            Phase::Idle if prompt.trim().to_lowercase() == START_GAME => {
                session.phase = Phase::InGame;
                tracing::info!("Game started");
                ResponseEnvelope::text(MOVE_PROMPT)
            }
            Phase::Idle => self.ask_llm(prompt).await,
            Phase::InGame => {
                ResponseEnvelope::text(game::play_round(session, prompt, self.moves.as_ref()))
            }
        }
    }

    async fn ask_llm(&self, prompt: &str) -> ResponseEnvelope {
        let request = LlmRequest::new(prompt)
            .with_system(SYSTEM_INSTRUCTION)
            .with_max_tokens(MAX_REPLY_TOKENS);

        match self.llm.complete(&request).await {
            Ok(response) => match envelope::parse(&response.text) {
                Normalized::Ok(envelope) => {
                    tracing::debug!(
                        function_call_used = envelope.function_call_used,
                        function_call = ?envelope.function_call,
                        "Parsed reply envelope"
                    );
                    envelope
                }
                Normalized::Malformed(raw) => {
                    tracing::warn!(raw = %raw, "LLM reply is not a valid envelope, sending raw text");
                    ResponseEnvelope::text(raw)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind, "LLM fallback failed");
                ResponseEnvelope::text(APOLOGY)
            }
        }
    }
}
