//! Scripted fakes shared by unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use crate::enrichment::{EnrichmentError, PageReader};
use crate::filters::{LeadCounter, SearchFilters};
use crate::inference::{
    ChatRequest, ChunkStream, CompletionService, InferenceError, JsonCompletion, JsonRequest,
    ModelRole, StreamChunk, ToolCall, Usage,
};
use crate::platform::{
    Account, Campaign, EnrichmentStatus, Lead, LeadPage, ListLeadsRequest, NewCampaign, NewLead,
    PlatformError, ProspectingPlatform, SourceRequest, SourcingJob,
};
use crate::usage::{SinkError, UsageEvent, UsageSink};

/// Let spawned background tasks run.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn step_usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
    }
}

// ─── ScriptedCompletion ──────────────────────────────────────────────────────

enum ChatScript {
    Chunks(Vec<StreamChunk>),
    Broken(String),
    RequestError,
}

enum JsonScript {
    Text(String),
    Error,
}

/// Completion service replaying queued replies in order. An exhausted
/// script fails the call.
#[derive(Default)]
pub struct ScriptedCompletion {
    chat: Mutex<VecDeque<ChatScript>>,
    json: Mutex<VecDeque<JsonScript>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    json_requests: Mutex<Vec<JsonRequest>>,
    steps_scripted: usize,
}

impl ScriptedCompletion {
    fn push_chat(mut self, script: ChatScript) -> Self {
        self.chat.get_mut().unwrap().push_back(script);
        self.steps_scripted += 1;
        self
    }

    pub fn with_json(mut self, text: impl Into<String>) -> Self {
        self.json.get_mut().unwrap().push_back(JsonScript::Text(text.into()));
        self
    }

    pub fn with_json_error(mut self) -> Self {
        self.json.get_mut().unwrap().push_back(JsonScript::Error);
        self
    }

    /// A text step streamed as two tokens split at the first space.
    pub fn with_text(self, text: &str) -> Self {
        let mut chunks = Vec::new();
        match text.find(' ') {
            Some(at) => {
                chunks.push(token_chunk(&text[..at]));
                chunks.push(token_chunk(&text[at..]));
            }
            None => chunks.push(token_chunk(text)),
        }
        chunks.push(StreamChunk {
            finish_reason: Some("stop".into()),
            usage: Some(step_usage()),
            ..StreamChunk::default()
        });
        self.push_chat(ChatScript::Chunks(chunks))
    }

    /// A tool-calling step with `(name, raw arguments)` pairs.
    pub fn with_tool_calls(self, calls: &[(&str, &str)]) -> Self {
        self.with_tool_calls_finishing(calls, "tool_calls")
    }

    /// Tool calls reported under an arbitrary finish reason.
    pub fn with_tool_calls_finishing(self, calls: &[(&str, &str)], reason: &str) -> Self {
        let step = self.steps_scripted;
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{step}_{i}"),
                name: name.to_string(),
                arguments: arguments.to_string(),
            })
            .collect();
        self.push_chat(ChatScript::Chunks(vec![StreamChunk {
            tool_calls: Some(calls),
            finish_reason: Some(reason.into()),
            usage: Some(step_usage()),
            ..StreamChunk::default()
        }]))
    }

    pub fn with_request_error(self) -> Self {
        self.push_chat(ChatScript::RequestError)
    }

    /// One token, then a stream error.
    pub fn with_broken_stream(self, text: &str) -> Self {
        self.push_chat(ChatScript::Broken(text.to_string()))
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn json_requests(&self) -> Vec<JsonRequest> {
        self.json_requests.lock().unwrap().clone()
    }
}

fn token_chunk(token: &str) -> StreamChunk {
    StreamChunk {
        token: Some(token.to_string()),
        ..StreamChunk::default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, InferenceError> {
        self.chat_requests.lock().unwrap().push(request);
        let script = self.chat.lock().unwrap().pop_front();
        let items: Vec<Result<StreamChunk, InferenceError>> = match script {
            Some(ChatScript::Chunks(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(ChatScript::Broken(text)) => vec![
                Ok(token_chunk(&text)),
                Err(InferenceError::StreamError {
                    reason: "connection reset".into(),
                }),
            ],
            Some(ChatScript::RequestError) => {
                return Err(InferenceError::HttpError {
                    status: 500,
                    body: "upstream down".into(),
                })
            }
            None => {
                return Err(InferenceError::StreamError {
                    reason: "chat script exhausted".into(),
                })
            }
        };
        Ok(Box::pin(stream::iter(items)))
    }

    async fn complete_json(&self, request: JsonRequest) -> Result<JsonCompletion, InferenceError> {
        let model = self.model_name(request.role).to_string();
        self.json_requests.lock().unwrap().push(request);
        match self.json.lock().unwrap().pop_front() {
            Some(JsonScript::Text(text)) => Ok(JsonCompletion {
                text,
                usage: Usage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
                model,
            }),
            Some(JsonScript::Error) => Err(InferenceError::HttpError {
                status: 500,
                body: "upstream down".into(),
            }),
            None => Err(InferenceError::StreamError {
                reason: "json script exhausted".into(),
            }),
        }
    }

    fn model_name(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Primary => "mistral-large-latest",
            ModelRole::Fast => "mistral-small-latest",
        }
    }
}

// ─── RecordingUsageSink ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingUsageSink {
    events: Mutex<Vec<UsageEvent>>,
}

impl RecordingUsageSink {
    pub fn events(&self) -> Vec<UsageEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageSink for RecordingUsageSink {
    async fn record(&self, event: UsageEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

// ─── ScriptedReader ──────────────────────────────────────────────────────────

pub enum PageScript {
    Page(String),
    /// HTTP failure with this status.
    Error(u16),
}

/// Page reader replaying queued pages; an exhausted script reads an empty page.
#[derive(Default)]
pub struct ScriptedReader {
    pages: Mutex<VecDeque<PageScript>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedReader {
    pub fn new(pages: impl IntoIterator<Item = PageScript>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageReader for ScriptedReader {
    async fn read(&self, url: &str) -> Result<String, EnrichmentError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().pop_front() {
            Some(PageScript::Page(markdown)) => Ok(markdown),
            Some(PageScript::Error(status)) => Err(EnrichmentError::HttpError {
                url: url.to_string(),
                status,
            }),
            None => Err(EnrichmentError::EmptyPage {
                url: url.to_string(),
            }),
        }
    }
}

// ─── ScriptedCounter ─────────────────────────────────────────────────────────

/// Lead counter replaying counts; 0 once the script runs out.
#[derive(Default)]
pub struct ScriptedCounter {
    counts: Mutex<VecDeque<u64>>,
    seen: Mutex<Vec<SearchFilters>>,
    failing: bool,
}

impl ScriptedCounter {
    pub fn new(counts: impl IntoIterator<Item = u64>) -> Self {
        Self {
            counts: Mutex::new(counts.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<SearchFilters> {
        self.seen.lock().unwrap().clone()
    }
}

fn http_error(path: &str, status: u16) -> PlatformError {
    PlatformError::HttpError {
        method: "POST".into(),
        path: path.into(),
        status,
        body: "scripted failure".into(),
    }
}

#[async_trait]
impl LeadCounter for ScriptedCounter {
    async fn count(&self, filters: &SearchFilters) -> Result<u64, PlatformError> {
        self.seen.lock().unwrap().push(filters.clone());
        if self.failing {
            return Err(http_error("/supersearch-enrichment/count-leads-from-supersearch", 500));
        }
        Ok(self.counts.lock().unwrap().pop_front().unwrap_or(0))
    }
}

// ─── FakePlatform ────────────────────────────────────────────────────────────

/// In-memory prospecting platform.
pub struct FakePlatform {
    counts: Mutex<VecDeque<u64>>,
    count_delay: Option<Duration>,
    counted: Mutex<Vec<SearchFilters>>,
    preview: Vec<Lead>,
    in_progress_polls: usize,
    sourced: Vec<Lead>,
    status_polls: Mutex<usize>,
    failing_leads: HashSet<String>,
    campaigns: Mutex<Vec<NewCampaign>>,
    created_leads: Mutex<Vec<NewLead>>,
    activated: Mutex<Vec<String>>,
    accounts: Vec<Account>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            counts: Mutex::default(),
            count_delay: None,
            counted: Mutex::default(),
            preview: Vec::new(),
            in_progress_polls: 0,
            sourced: Vec::new(),
            status_polls: Mutex::new(0),
            failing_leads: HashSet::new(),
            campaigns: Mutex::default(),
            created_leads: Mutex::default(),
            activated: Mutex::default(),
            accounts: vec![Account {
                email: "sender@acme.io".into(),
                first_name: Some("Sam".into()),
                last_name: None,
                status: None,
            }],
        }
    }
}

impl FakePlatform {
    pub fn with_counts(counts: impl IntoIterator<Item = u64>) -> Self {
        Self {
            counts: Mutex::new(counts.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every count takes `delay` to answer.
    pub fn with_count_delay(mut self, delay: Duration) -> Self {
        self.count_delay = Some(delay);
        self
    }

    pub fn with_preview(mut self, leads: Vec<Lead>) -> Self {
        self.preview = leads;
        self
    }

    /// Sourcing stays in progress for `in_progress_polls` status checks.
    pub fn with_sourcing(mut self, in_progress_polls: usize, leads: Vec<Lead>) -> Self {
        self.in_progress_polls = in_progress_polls;
        self.sourced = leads;
        self
    }

    pub fn failing_lead(mut self, email: &str) -> Self {
        self.failing_leads.insert(email.to_string());
        self
    }

    pub fn counted(&self) -> Vec<SearchFilters> {
        self.counted.lock().unwrap().clone()
    }

    pub fn status_polls(&self) -> usize {
        *self.status_polls.lock().unwrap()
    }

    pub fn campaigns(&self) -> Vec<NewCampaign> {
        self.campaigns.lock().unwrap().clone()
    }

    pub fn created_leads(&self) -> Vec<NewLead> {
        self.created_leads.lock().unwrap().clone()
    }

    pub fn activated(&self) -> Vec<String> {
        self.activated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProspectingPlatform for FakePlatform {
    async fn count_leads(&self, filters: &SearchFilters) -> Result<u64, PlatformError> {
        if let Some(delay) = self.count_delay {
            tokio::time::sleep(delay).await;
        }
        self.counted.lock().unwrap().push(filters.clone());
        Ok(self.counts.lock().unwrap().pop_front().unwrap_or(0))
    }

    async fn preview_leads(&self, _filters: &SearchFilters) -> Result<Vec<Lead>, PlatformError> {
        Ok(self.preview.clone())
    }

    async fn source_leads(
        &self,
        _filters: &SearchFilters,
        _request: &SourceRequest,
    ) -> Result<SourcingJob, PlatformError> {
        Ok(SourcingJob {
            id: "search_1".into(),
            resource_id: "list_1".into(),
        })
    }

    async fn enrichment_status(&self, _resource_id: &str) -> Result<EnrichmentStatus, PlatformError> {
        let mut polls = self.status_polls.lock().unwrap();
        *polls += 1;
        Ok(EnrichmentStatus {
            in_progress: *polls <= self.in_progress_polls,
            exists: true,
        })
    }

    async fn list_leads(&self, request: &ListLeadsRequest) -> Result<LeadPage, PlatformError> {
        Ok(LeadPage {
            items: self.sourced.iter().take(request.limit as usize).cloned().collect(),
            next_starting_after: None,
        })
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<Lead, PlatformError> {
        if self.failing_leads.contains(&lead.email) {
            return Err(http_error("/leads", 400));
        }
        self.created_leads.lock().unwrap().push(lead.clone());
        Ok(Lead {
            email: Some(lead.email.clone()),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            company_name: lead.company_name.clone(),
            ..Lead::default()
        })
    }

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, PlatformError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        campaigns.push(campaign.clone());
        Ok(Campaign {
            id: format!("camp_{}", campaigns.len()),
            name: campaign.name.clone(),
            status: None,
        })
    }

    async fn activate_campaign(&self, campaign_id: &str) -> Result<(), PlatformError> {
        self.activated.lock().unwrap().push(campaign_id.to_string());
        Ok(())
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, PlatformError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, c)| Campaign {
                id: format!("camp_{}", i + 1),
                name: c.name.clone(),
                status: None,
            })
            .collect())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, PlatformError> {
        Ok(self.accounts.clone())
    }
}
