//! Thin wrapper over a DeepSeek-compatible chat-completion endpoint:
//! raw-text conversion to CSV, portfolio commentary and Q&A.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmCfg;
use crate::parser::{self, EXPECTED_HEADER};
use crate::types::RawRecord;
use crate::utils::mask_secret;

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    convert_max_tokens: u32,
    reply_max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

impl LlmClient {
    /// Build a client; the API key is read from the env var named in config.
    pub fn from_config(cfg: &LlmCfg) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .with_context(|| format!("{} is not set", cfg.api_key_env))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_sec))
            .build()
            .context("build http client")?;
        info!(
            "Model client: base_url={}, model={}, key={}",
            cfg.base_url,
            cfg.model,
            mask_secret(&api_key)
        );
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            convert_max_tokens: cfg.convert_max_tokens,
            reply_max_tokens: cfg.reply_max_tokens,
        })
    }

    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };
        debug!("POST {} ({} prompt chars)", url, prompt.len());

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("API Error ({}): {}", status.as_u16(), text);
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .context("chat completion response json decode failed")?;
        first_content(parsed)
    }

    /// Convert free-form activity text to the ledger CSV. Returns the cleaned
    /// CSV and its parsed rows.
    pub async fn convert_to_csv(&self, raw_text: &str) -> Result<(String, Vec<RawRecord>)> {
        let reply = self
            .complete(&conversion_prompt(raw_text), 0.0, self.convert_max_tokens)
            .await
            .context("failed to convert transaction data")?;
        let csv = parser::strip_model_wrapping(&reply).to_string();
        let rows = parser::parse_model_csv(&csv)?;
        info!("Model produced {} rows", rows.len());
        Ok((csv, rows))
    }

    pub async fn analyze_portfolio(&self, ledger_table: &str) -> Result<String> {
        self.complete(&analysis_prompt(ledger_table), 0.7, self.reply_max_tokens)
            .await
            .context("portfolio analysis failed")
    }

    pub async fn chat_response(&self, question: &str, context: &str) -> Result<String> {
        self.complete(&chat_prompt(question, context), 0.5, self.reply_max_tokens)
            .await
            .context("question failed")
    }
}

fn first_content(resp: ChatResponse) -> Result<String> {
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}

pub fn conversion_prompt(raw_text: &str) -> String {
    format!(
        "Convert the following transaction history into CSV format with EXACTLY these columns in this order:
{EXPECTED_HEADER}

Required formatting:
1. Column names must be EXACTLY as shown above (case-sensitive)
2. date must be YYYY-MM-DD format
3. security must be stock symbol only (e.g., AAPL instead of Apple Inc.)
4. transaction_type must be either 'BUY' or 'SELL' only
5. amount must be a number only (no currency symbols or commas)

Rules:
- Remove all currency symbols and commas from amounts
- Remove any option/warrant details from tickers
- Skip any cancelled or incomplete transactions
- Each line must contain exactly these 4 columns
- First line must be the header row exactly as shown above
- Do not include any markdown formatting or explanations

Here's the transaction data:
{raw_text}

Remember: Return ONLY the CSV data, starting with the exact header row shown above."
    )
}

pub fn analysis_prompt(ledger_table: &str) -> String {
    format!(
        "Analyze the following investment portfolio transactions and provide insights:

{ledger_table}

Provide a clear analysis covering:
1. Overall portfolio performance
2. Key trends in trading patterns
3. Risk assessment
4. Suggestions for portfolio optimization

Focus on actionable insights and clear metrics."
    )
}

pub fn chat_prompt(question: &str, context: &str) -> String {
    format!(
        "Context about the portfolio:
{context}

User question: {question}

Provide a clear, specific answer based on the portfolio data.
Focus on actionable insights and concrete numbers when available."
    )
}
