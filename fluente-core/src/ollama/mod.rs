//! Ollama backend for content generation and the chat tutor
//!
//! Content and corrections use `/api/generate` in JSON mode; tutor replies
//! stream from `/api/chat` as newline-delimited JSON. `ureq` is blocking, so
//! every request runs on the blocking pool.

use serde::{Deserialize, Serialize};

#[cfg(feature = "ureq")]
pub use client::OllamaClient;

/// Ollama configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,
    /// Ollama port
    pub port: u16,
    /// Model for content and chat
    pub model: String,
    /// Language being learned
    pub target_language: String,
    /// Timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum attempts per request
    pub max_retries: u32,
    /// Temperature for generation (0.0 - 1.0)
    pub temperature: Option<f32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".to_string(),
            port: 11434,
            model: "llama3.2:3b".to_string(),
            target_language: "Portuguese".to_string(),
            timeout_seconds: 60,
            max_retries: 3,
            temperature: Some(0.7),
        }
    }
}

impl OllamaConfig {
    /// Full URL of an API endpoint
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}:{}{}", self.host.trim_end_matches('/'), self.port, path)
    }
}

#[cfg(feature = "ureq")]
mod client {
    use std::io::{BufRead, BufReader};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::OllamaConfig;
    use crate::core::traits::{
        ContentGenerator, GenerationRequest, ReplyStream, ServiceError, TutorBackend,
    };
    use crate::generation::ContentKind;
    use crate::tutor::{ChatTurn, Correction, Role};

    /// Ollama client implementing both generation capabilities
    #[derive(Debug, Clone)]
    pub struct OllamaClient {
        config: OllamaConfig,
        agent: ureq::Agent,
    }

    impl OllamaClient {
        /// Create a new Ollama client
        pub fn new(config: OllamaConfig) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build();
            Self { config, agent }
        }

        /// Client configuration
        pub fn config(&self) -> &OllamaConfig {
            &self.config
        }

        fn options(&self) -> Value {
            match self.config.temperature {
                Some(temperature) => json!({ "temperature": temperature }),
                None => json!({}),
            }
        }

        /// POST `body` and return the parsed response, retrying transient failures
        async fn post(&self, path: &str, body: Value) -> Result<Value, ServiceError> {
            let endpoint = self.config.endpoint(path);
            let attempts = self.config.max_retries.max(1);

            let mut last_error = ServiceError::new("no attempt made");
            for attempt in 1..=attempts {
                let agent = self.agent.clone();
                let url = endpoint.clone();
                let payload = body.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    let response = agent
                        .post(&url)
                        .set("Content-Type", "application/json")
                        .send_json(payload)
                        .map_err(service_error)?;
                    response
                        .into_json::<Value>()
                        .map_err(|e| ServiceError::new(format!("Failed to parse JSON response: {e}")))
                })
                .await
                .map_err(|e| ServiceError::new(format!("Request task failed: {e}")))?;

                match outcome {
                    Ok(value) => return Ok(value),
                    Err(e) if !is_transient(&e) => return Err(e),
                    Err(e) => {
                        tracing::warn!(attempt, endpoint = %endpoint, error = %e, "Ollama request failed");
                        last_error = e;
                        if attempt < attempts {
                            tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                        }
                    },
                }
            }

            Err(last_error)
        }

        /// Run a JSON-mode completion and parse the model's answer
        async fn generate_json(&self, prompt: String) -> Result<Value, ServiceError> {
            let body = json!({
                "model": self.config.model,
                "prompt": prompt,
                "format": "json",
                "stream": false,
                "options": self.options(),
            });
            let response = self.post("/api/generate", body).await?;
            let text = response_text(&response)?;
            serde_json::from_str(text)
                .map_err(|e| ServiceError::new(format!("Model returned invalid JSON: {e}")))
        }

        fn content_prompt(&self, request: &GenerationRequest) -> String {
            let language = &self.config.target_language;
            let params = &request.params;
            let task = match request.kind {
                ContentKind::Conjugation => format!(
                    "Conjugate the {language} verb \"{}\" in the main indicative tenses. \
                     Answer as {{\"verb\", \"translation\", \"tenses\": [{{\"name\", \"forms\": [{{\"person\", \"form\"}}]}}]}}.",
                    params["verb"].as_str().unwrap_or_default()
                ),
                ContentKind::Examples => format!(
                    "Write three short {language} sentences using \"{}\" (a form of \"{}\"). \
                     Answer as {{\"sentences\": [{{\"text\", \"translation\"}}]}}.",
                    params["form"].as_str().unwrap_or_default(),
                    params["verb"].as_str().unwrap_or_default()
                ),
                ContentKind::Vocabulary => format!(
                    "List ten common {language} words for the category \"{}\". \
                     Answer as {{\"category\", \"words\": [{{\"word\", \"translation\", \"example\"}}]}}.",
                    params["category"].as_str().unwrap_or_default()
                ),
                ContentKind::Scene => format!(
                    "Write a short {language} dialogue about {} ({}) practising \"{}\". \
                     Answer as {{\"title\", \"lines\": [{{\"speaker\", \"text\", \"translation\"}}]}}.",
                    params["domain"].as_str().unwrap_or_default(),
                    params["subtopic"].as_str().unwrap_or_default(),
                    params["function"].as_str().unwrap_or_default()
                ),
                ContentKind::Speech => String::new(),
            };

            if request.exclude.is_empty() {
                task
            } else {
                format!(
                    "{task} Do not use any of these: {}.",
                    request.exclude.join(", ")
                )
            }
        }

        fn chat_messages(&self, history: &[ChatTurn], message: &str) -> Vec<Value> {
            let system = format!(
                "You are a friendly {} tutor. Reply only in {}, briefly, and keep the conversation going.",
                self.config.target_language, self.config.target_language
            );
            let mut messages = vec![json!({ "role": "system", "content": system })];
            messages.extend(history.iter().map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Tutor => "assistant",
                };
                json!({ "role": role, "content": turn.text })
            }));
            messages.push(json!({ "role": "user", "content": message }));
            messages
        }
    }

    #[async_trait]
    impl ContentGenerator for OllamaClient {
        async fn generate(&self, request: &GenerationRequest) -> Result<Value, ServiceError> {
            if request.kind == ContentKind::Speech {
                return Err(ServiceError::new("Ollama does not synthesize speech"));
            }
            self.generate_json(self.content_prompt(request)).await
        }

        fn name(&self) -> &str {
            "ollama"
        }
    }

    #[async_trait]
    impl TutorBackend for OllamaClient {
        async fn correct(
            &self,
            _history: &[ChatTurn],
            message: &str,
        ) -> Result<Option<Correction>, ServiceError> {
            let prompt = format!(
                "Check this {} sentence written by a learner: \"{message}\". \
                 Answer as {{\"correct\": bool, \"corrected\": string, \"translation\": string}} \
                 where translation is the English meaning of the corrected sentence.",
                self.config.target_language
            );
            let verdict = self.generate_json(prompt).await?;

            if verdict["correct"].as_bool().unwrap_or(true) {
                return Ok(None);
            }
            let corrected = verdict["corrected"].as_str().unwrap_or_default();
            if corrected.is_empty() || corrected == message {
                return Ok(None);
            }
            Ok(Some(Correction::new(
                corrected,
                verdict["translation"].as_str().unwrap_or_default(),
            )))
        }

        async fn reply_stream(
            &self,
            history: &[ChatTurn],
            message: &str,
        ) -> Result<ReplyStream, ServiceError> {
            let body = json!({
                "model": self.config.model,
                "messages": self.chat_messages(history, message),
                "stream": true,
                "options": self.options(),
            });
            let agent = self.agent.clone();
            let url = self.config.endpoint("/api/chat");

            let response = tokio::task::spawn_blocking(move || {
                agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_json(body)
                    .map_err(service_error)
            })
            .await
            .map_err(|e| ServiceError::new(format!("Request task failed: {e}")))??;

            let (tx, rx) = mpsc::channel::<Result<String, ServiceError>>(32);
            tokio::task::spawn_blocking(move || {
                let reader = BufReader::new(response.into_reader());
                for line in reader.lines() {
                    let item = line
                        .map_err(|e| ServiceError::new(format!("Reply stream interrupted: {e}")))
                        .and_then(|line| parse_chat_line(&line));
                    let (chunk, done) = match item {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            let _ = tx.blocking_send(Err(e));
                            return;
                        },
                    };
                    if !chunk.is_empty() && tx.blocking_send(Ok(chunk)).is_err() {
                        // Receiver dropped
                        return;
                    }
                    if done {
                        return;
                    }
                }
            });

            Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed())
        }

        async fn translate(&self, text: &str) -> Result<String, ServiceError> {
            let body = json!({
                "model": self.config.model,
                "prompt": format!("Translate into English. Answer with the translation only.\n\n{text}"),
                "stream": false,
                "options": self.options(),
            });
            let response = self.post("/api/generate", body).await?;
            Ok(response_text(&response)?.trim().to_string())
        }
    }

    fn service_error(error: ureq::Error) -> ServiceError {
        match error {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                ServiceError::with_status(code, format!("Ollama returned {code}: {body}"))
            },
            ureq::Error::Transport(transport) => ServiceError::new(transport.to_string()),
        }
    }

    fn is_transient(error: &ServiceError) -> bool {
        match error.status {
            Some(status) => status >= 500,
            None => true,
        }
    }

    fn response_text(response: &Value) -> Result<&str, ServiceError> {
        response["response"]
            .as_str()
            .ok_or_else(|| ServiceError::new(format!("Invalid response format: {response}")))
    }

    /// Parse one NDJSON line of a chat stream into `(content, done)`
    fn parse_chat_line(line: &str) -> Result<(String, bool), ServiceError> {
        if line.trim().is_empty() {
            return Ok((String::new(), false));
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| ServiceError::new(format!("Invalid stream line: {e}")))?;
        if let Some(error) = value["error"].as_str() {
            return Err(ServiceError::new(error.to_string()));
        }
        let content = value["message"]["content"].as_str().unwrap_or_default().to_string();
        Ok((content, value["done"].as_bool().unwrap_or(false)))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_chat_line() {
            let (chunk, done) =
                parse_chat_line(r#"{"message":{"role":"assistant","content":"Olá"},"done":false}"#)
                    .unwrap();
            assert_eq!(chunk, "Olá");
            assert!(!done);

            let (chunk, done) = parse_chat_line(r#"{"message":{"content":""},"done":true}"#).unwrap();
            assert!(chunk.is_empty());
            assert!(done);

            assert!(parse_chat_line(r#"{"error":"model not found"}"#).is_err());
        }

        #[test]
        fn test_prompt_embeds_exclusions() {
            let client = OllamaClient::new(OllamaConfig::default());
            let request = GenerationRequest {
                kind: ContentKind::Vocabulary,
                params: json!({"category": "Food"}),
                exclude: vec!["pão".to_string(), "queijo".to_string()],
            };
            let prompt = client.content_prompt(&request);
            assert!(prompt.contains("\"Food\""));
            assert!(prompt.ends_with("Do not use any of these: pão, queijo."));
        }

        #[test]
        fn test_only_server_errors_are_retried() {
            assert!(is_transient(&ServiceError::new("connection refused")));
            assert!(is_transient(&ServiceError::with_status(503, "busy")));
            assert!(!is_transient(&ServiceError::with_status(429, "quota")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let config = OllamaConfig {
            host: "http://localhost/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint("/api/chat"), "http://localhost:11434/api/chat");
    }
}
