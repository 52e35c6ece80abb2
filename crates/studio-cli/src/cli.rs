use clap::{Args, Parser, Subcommand, ValueEnum};
use studio_core::SearchMode;

/// Manage studio agents and try workflows from the terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "studio", version, about, long_about = None)]
pub struct Cli {
    /// Studio API base URL (overrides STUDIO_API_BASE_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Agent records
    #[command(subcommand)]
    Agents(AgentsCommand),
    /// Workflow applications
    #[command(subcommand)]
    Workflows(WorkflowsCommand),
    /// List knowledge bases
    KnowledgeBases,
    /// Upstream provider keys
    #[command(subcommand)]
    ApiKeys(ApiKeysCommand),
    /// Send one prompt to a workflow and stream the answer
    Run(RunArgs),
    /// Interactive multi-turn chat with a workflow
    Chat(SessionArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum AgentsCommand {
    /// List agents, newest first
    List {
        /// Case-insensitive match on name or description
        #[arg(long)]
        query: Option<String>,
        /// Only agents carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Hide disabled agents
        #[arg(long)]
        active: bool,
        /// Only agents you can edit
        #[arg(long, conflicts_with = "base")]
        workspace: bool,
        /// Only base agents (admin)
        #[arg(long)]
        base: bool,
    },
    /// Show one agent
    Show { id: i64 },
    /// List every tag in use
    Tags,
    /// Enable or disable an agent
    Toggle { id: i64 },
    /// Delete an agent
    Delete {
        id: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete every agent (admin)
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Create an agent bound to a workflow
    Create(CreateArgs),
    /// Change fields of an existing agent
    Update(UpdateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    pub name: String,

    /// Workflow application id the agent runs
    #[arg(long)]
    pub workflow: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Knowledge base id, repeatable
    #[arg(long = "dataset")]
    pub datasets: Vec<String>,

    #[arg(long, value_enum, default_value_t = SearchModeArg::Embedding)]
    pub search_mode: SearchModeArg,

    #[arg(long, default_value_t = 0.4)]
    pub similarity: f32,

    #[arg(long, default_value_t = 5000)]
    pub limit: u32,

    /// Re-rank search results
    #[arg(long)]
    pub rerank: bool,

    /// Readable by everyone (agents are private by default)
    #[arg(long)]
    pub public: bool,
}

/// Unset flags keep the stored value.
#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Workflow application id the agent runs
    #[arg(long)]
    pub workflow: Option<String>,

    /// Make the agent readable by everyone
    #[arg(long, conflicts_with = "private")]
    pub public: bool,

    /// Restrict the agent to its owner and admins
    #[arg(long)]
    pub private: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModeArg {
    Embedding,
    FullText,
    Mixed,
}

impl From<SearchModeArg> for SearchMode {
    fn from(value: SearchModeArg) -> Self {
        match value {
            SearchModeArg::Embedding => SearchMode::Embedding,
            SearchModeArg::FullText => SearchMode::FullTextRecall,
            SearchModeArg::Mixed => SearchMode::MixedRecall,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum WorkflowsCommand {
    /// List workflow applications
    List {
        /// Include deleted workflows
        #[arg(long)]
        all: bool,
    },
    /// Show one workflow
    Show { id: i64 },
    /// Register a workflow application
    Create(WorkflowArgs),
    /// Change fields of an existing workflow
    Update {
        id: i64,
        #[command(flatten)]
        fields: WorkflowFields,
    },
    /// Delete a workflow
    Delete {
        id: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Delete every workflow (admin)
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Run path appended to the gateway base URL
    #[arg(long)]
    pub api_path: Option<String>,

    /// Token sent with runs of this workflow
    #[arg(long)]
    pub app_token: Option<String>,
}

/// Unset flags keep the stored value.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkflowFields {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub api_path: Option<String>,

    #[arg(long)]
    pub app_token: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ApiKeysCommand {
    /// Show the stored keys (masked)
    Show,
    /// Store provider keys; omitted values stay unchanged
    Set(ApiKeysArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ApiKeysArgs {
    #[arg(long)]
    pub langflow_key: Option<String>,

    #[arg(long)]
    pub langflow_url: Option<String>,

    #[arg(long)]
    pub fastgpt_key: Option<String>,

    #[arg(long)]
    pub fastgpt_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Workflow application id
    #[arg(long)]
    pub workflow: String,

    /// Model id passed to the workflow
    #[arg(long)]
    pub model: String,

    /// Ask for a single JSON answer instead of a stream
    #[arg(long)]
    pub no_stream: bool,

    #[arg(long)]
    pub system: Option<String>,

    /// Gateway token (overrides STUDIO_GATEWAY_TOKEN)
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    pub prompt: String,
}
