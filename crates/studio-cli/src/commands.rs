use std::sync::Arc;

use chrono::{DateTime, Utc};
use studio_core::listing::collect_tags;
use studio_core::{
    AccessControl, Agent, AgentFilter, AgentForm, AgentWithOwner, ApiKeysConfig, ApiKeysForm,
    KnowledgeBaseSettings, StudioConfig, WorkflowApp, WorkflowForm, mask_api_key,
};
use studio_harness::StoreError;
use studio_harness::prelude::*;
use tokio::io::AsyncBufReadExt as _;
use tracing::info;

use crate::cli::{
    AgentsCommand, ApiKeysArgs, ApiKeysCommand, Command, CreateArgs, RunArgs, SessionArgs,
    UpdateArgs, WorkflowArgs, WorkflowFields, WorkflowsCommand,
};
use crate::printer::TerminalPrinter;

const CHAT_BANNER: &str = "/clear resets, /exit quits, Ctrl-C stops an answer";

pub async fn dispatch(
    command: Command,
    config: &StudioConfig,
    json: bool,
) -> Result<(), HarnessError> {
    match command {
        Command::Agents(cmd) => agents(cmd, config, json).await,
        Command::Workflows(cmd) => workflows(cmd, config, json).await,
        Command::KnowledgeBases => knowledge_bases(config, json).await,
        Command::ApiKeys(cmd) => api_keys(cmd, config, json).await,
        Command::Run(args) => run_prompt(args, config, json).await,
        Command::Chat(args) => chat(args, config).await,
    }
}

async fn agents(
    cmd: AgentsCommand,
    config: &StudioConfig,
    json: bool,
) -> Result<(), HarnessError> {
    let api = HttpStudioApi::new(config)?;
    match cmd {
        AgentsCommand::List {
            query,
            tag,
            active,
            workspace,
            base,
        } => {
            let all = if base {
                without_owner(api.list_base_agents().await?)
            } else if workspace {
                api.list_workspace_agents().await?
            } else {
                api.list_agents().await?
            };
            let mut filter = AgentFilter::default().active_only(active);
            if let Some(query) = query {
                filter = filter.query(query);
            }
            if let Some(tag) = tag {
                filter = filter.tag(tag);
            }
            let agents = filter.apply(all);
            if json {
                return print_json(&agents);
            }
            for entry in &agents {
                let owner = entry.user.as_ref().map(|u| u.name.as_str()).unwrap_or("-");
                println!(
                    "{:>6}  {:<8}  {:<32}  {:<16}  {}",
                    entry.agent.id,
                    status_label(&entry.agent),
                    entry.agent.name,
                    owner,
                    format_time(entry.agent.updated_at_utc()),
                );
            }
            Ok(())
        }
        AgentsCommand::Show { id } => {
            let agent = require_agent(&api, id).await?;
            if json {
                return print_json(&agent);
            }
            print_agent(&agent);
            Ok(())
        }
        AgentsCommand::Tags => {
            let agents = api.list_agents().await?;
            for tag in collect_tags(agents.iter().map(|entry| &entry.agent)) {
                println!("{tag}");
            }
            Ok(())
        }
        AgentsCommand::Toggle { id } => {
            let agent = api.toggle_agent(id).await?;
            let active = agent.is_active();
            info!(event = "cli.agent_toggled", id, active, "agent toggled");
            println!("agent {} is now {}", agent.id, status_label(&agent));
            Ok(())
        }
        AgentsCommand::Delete { id, yes } => {
            confirm(yes, &format!("delete agent {id}"))?;
            if api.delete_agent(id).await? {
                println!("agent {id} deleted");
            } else {
                println!("agent {id} was not deleted");
            }
            Ok(())
        }
        AgentsCommand::DeleteAll { yes } => {
            confirm(yes, "delete every agent")?;
            report_bulk_delete("agents", api.delete_all_agents().await?);
            Ok(())
        }
        AgentsCommand::Create(args) => {
            let form = create_form(args);
            let agent = api.create_agent(&form).await?;
            info!(event = "cli.agent_created", id = agent.id, "agent created");
            if json {
                return print_json(&agent);
            }
            print_agent(&agent);
            Ok(())
        }
        AgentsCommand::Update(args) => {
            let current = require_agent(&api, args.id).await?;
            let form = update_form(&current, &args);
            let agent = api.update_agent(args.id, &form).await?;
            info!(event = "cli.agent_updated", id = agent.id, "agent updated");
            if json {
                return print_json(&agent);
            }
            print_agent(&agent);
            Ok(())
        }
    }
}

async fn require_agent(api: &HttpStudioApi, id: i64) -> Result<Agent, HarnessError> {
    api.get_agent(id)
        .await?
        .ok_or_else(|| StoreError::Missing(format!("agent {id}")).into())
}

/// Base agents come without owner details.
fn without_owner(agents: Vec<Agent>) -> Vec<AgentWithOwner> {
    agents
        .into_iter()
        .map(|agent| AgentWithOwner { agent, user: None })
        .collect()
}

fn create_form(args: CreateArgs) -> AgentForm {
    let mut form = AgentForm::new(0, args.name, args.workflow)
        .description(args.description);
    if !args.datasets.is_empty() {
        form = form.knowledge_base(KnowledgeBaseSettings {
            dataset_ids: args.datasets,
            search_mode: args.search_mode.into(),
            similarity: args.similarity,
            limit: args.limit,
            using_rerank: args.rerank,
            ..KnowledgeBaseSettings::default()
        });
    }
    if args.public {
        form = form.access_control(None);
    } else {
        form = form.access_control(Some(AccessControl::private()));
    }
    form
}

fn update_form(current: &Agent, args: &UpdateArgs) -> AgentForm {
    let mut form = current.to_form();
    if let Some(name) = &args.name {
        form.name = name.clone();
    }
    if let Some(description) = &args.description {
        form.description = description.clone();
    }
    if let Some(workflow) = &args.workflow {
        form.base_app_id = Some(workflow.clone());
    }
    if args.public {
        form.access_control = None;
    } else if args.private {
        form.access_control = Some(AccessControl::private());
    }
    form
}

async fn workflows(
    cmd: WorkflowsCommand,
    config: &StudioConfig,
    json: bool,
) -> Result<(), HarnessError> {
    let api = HttpStudioApi::new(config)?;
    match cmd {
        WorkflowsCommand::List { all } => {
            let workflows: Vec<WorkflowApp> = api
                .list_workflows()
                .await?
                .into_iter()
                .filter(|w| all || !w.is_deleted)
                .collect();
            if json {
                return print_json(&workflows);
            }
            for workflow in &workflows {
                let api_path = workflow.resolved_api_path();
                println!(
                    "{:>6}  {:<32}  {:<32}  {}",
                    workflow.id,
                    workflow.name,
                    api_path.as_deref().unwrap_or("-"),
                    token_label(workflow),
                );
            }
            Ok(())
        }
        WorkflowsCommand::Show { id } => {
            let workflow = require_workflow(&api, id).await?;
            if json {
                return print_json(&workflow);
            }
            print_workflow(&workflow);
            Ok(())
        }
        WorkflowsCommand::Create(args) => {
            let workflow = api.create_workflow(&workflow_form(args)).await?;
            info!(event = "cli.workflow_created", id = workflow.id, "workflow created");
            if json {
                return print_json(&workflow);
            }
            print_workflow(&workflow);
            Ok(())
        }
        WorkflowsCommand::Update { id, fields } => {
            let current = require_workflow(&api, id).await?;
            let form = workflow_update_form(&current, fields);
            let workflow = api.update_workflow(id, &form).await?;
            info!(event = "cli.workflow_updated", id, "workflow updated");
            if json {
                return print_json(&workflow);
            }
            print_workflow(&workflow);
            Ok(())
        }
        WorkflowsCommand::Delete { id, yes } => {
            confirm(yes, &format!("delete workflow {id}"))?;
            if api.delete_workflow(id).await? {
                println!("workflow {id} deleted");
            } else {
                println!("workflow {id} was not deleted");
            }
            Ok(())
        }
        WorkflowsCommand::DeleteAll { yes } => {
            confirm(yes, "delete every workflow")?;
            report_bulk_delete("workflows", api.delete_all_workflows().await?);
            Ok(())
        }
    }
}

async fn require_workflow(api: &HttpStudioApi, id: i64) -> Result<WorkflowApp, HarnessError> {
    api.get_workflow(id)
        .await?
        .ok_or_else(|| StoreError::Missing(format!("workflow {id}")).into())
}

fn workflow_form(args: WorkflowArgs) -> WorkflowForm {
    let mut form = WorkflowForm::new(args.name).description(args.description);
    form.api_path = args.api_path;
    form.app_token = args.app_token;
    form
}

fn workflow_update_form(current: &WorkflowApp, fields: WorkflowFields) -> WorkflowForm {
    let mut form = current.to_form();
    if let Some(name) = fields.name {
        form.name = name;
    }
    if let Some(description) = fields.description {
        form.description = description;
    }
    if fields.api_path.is_some() {
        form.api_path = fields.api_path;
    }
    if fields.app_token.is_some() {
        form.app_token = fields.app_token;
    }
    form
}

async fn knowledge_bases(config: &StudioConfig, json: bool) -> Result<(), HarnessError> {
    let kbs = HttpStudioApi::new(config)?.list_knowledge_bases().await?;
    if json {
        return print_json(&kbs);
    }
    for kb in &kbs {
        println!("{:<26}  {:<32}  {}", kb.id, kb.name, kb.description);
    }
    Ok(())
}

async fn api_keys(
    cmd: ApiKeysCommand,
    config: &StudioConfig,
    json: bool,
) -> Result<(), HarnessError> {
    let api = HttpStudioApi::new(config)?;
    let stored = match cmd {
        ApiKeysCommand::Show => api.get_api_keys().await?,
        ApiKeysCommand::Set(args) => {
            let form = api_keys_form(args);
            let stored = api.update_api_keys(&form).await?;
            info!(event = "cli.api_keys_updated", "api keys updated");
            for line in submitted_keys(&form) {
                eprintln!("{line}");
            }
            stored
        }
    };
    if json {
        return print_json(&stored);
    }
    print_api_keys(&stored);
    Ok(())
}

fn api_keys_form(args: ApiKeysArgs) -> ApiKeysForm {
    ApiKeysForm {
        langflow_api_key: args.langflow_key,
        langflow_base_url: args.langflow_url,
        fastgpt_api_key: args.fastgpt_key,
        fastgpt_base_url: args.fastgpt_url,
    }
}

/// What was sent, keys masked.
fn submitted_keys(form: &ApiKeysForm) -> Vec<String> {
    let mask = |key: &Option<String>| key.as_deref().map(mask_api_key);
    let keys = [
        ("langflow key", mask(&form.langflow_api_key)),
        ("langflow url", form.langflow_base_url.clone()),
        ("fastgpt key", mask(&form.fastgpt_api_key)),
        ("fastgpt url", form.fastgpt_base_url.clone()),
    ];
    keys.into_iter()
        .filter_map(|(label, value)| value.map(|v| format!("set {label}: {v}")))
        .collect()
}

fn print_api_keys(config: &ApiKeysConfig) {
    if config.is_empty() {
        println!("no api keys stored");
        return;
    }
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".into());
    println!("langflow key: {}", show(&config.langflow_api_key_masked));
    println!("langflow url: {}", show(&config.langflow_base_url));
    println!("fastgpt key:  {}", show(&config.fastgpt_api_key_masked));
    println!("fastgpt url:  {}", show(&config.fastgpt_base_url));
}

fn session_context(
    args: &SessionArgs,
    config: &StudioConfig,
) -> Result<PlaygroundContext, HarnessError> {
    let gateway = Arc::new(HttpWorkflowGateway::new(config)?);
    let mut ctx = PlaygroundContext::new(gateway, &args.workflow, &args.model)
        .stream(!args.no_stream);
    if let Some(token) = &args.token {
        ctx = ctx.token(token);
    }
    if let Some(system) = &args.system {
        ctx = ctx.system_prompt(system);
    }
    Ok(ctx)
}

async fn run_prompt(args: RunArgs, config: &StudioConfig, json: bool) -> Result<(), HarnessError> {
    let ctx = session_context(&args.session, config)?;
    let playground = Playground::completion(ctx)?;
    let messages = playground.messages_for(&args.prompt);
    let mut run = start_run(playground.context().clone(), messages);

    let abort = run.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let mut printer = TerminalPrinter::default();
    while let Some(event) = run.next_event().await {
        match event {
            RunEvent::Started { run_id } => {
                info!(event = "cli.run_started", %run_id, "run started")
            }
            RunEvent::Updated { text, .. } if !json => printer.show(&text),
            RunEvent::Updated { .. } => {}
            RunEvent::Notice { notification, .. } => printer.notify(&notification),
            RunEvent::Finished { .. } => break,
        }
    }
    ctrl_c.abort();

    let outcome = run.finish().await?;
    if json {
        return print_json(&serde_json::json!({
            "text": outcome.text,
            "phase": outcome.phase,
            "notifications": outcome.notifications,
        }));
    }
    printer.finish();
    Ok(())
}

async fn chat(args: SessionArgs, config: &StudioConfig) -> Result<(), HarnessError> {
    let mut playground = Playground::chat(session_context(&args, config)?)?;
    let mut printer = TerminalPrinter::default();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    eprintln!("chatting with workflow {} ({CHAT_BANNER})", args.workflow);

    loop {
        eprint!("> ");
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| HarnessError::Validation(format!("failed to read stdin: {e}")))?
        else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/exit" => break,
            "/clear" => {
                playground.clear();
                continue;
            }
            _ => {}
        }

        let handle = AbortHandle::new();
        let mut signal = handle.signal();
        let outcome = {
            let submission = playground.submit(&line, &mut signal, &mut printer);
            tokio::pin!(submission);
            tokio::select! {
                outcome = &mut submission => outcome?,
                _ = tokio::signal::ctrl_c() => {
                    handle.abort();
                    submission.await?
                }
            }
        };
        for notification in outcome
            .notifications
            .iter()
            .filter(|n| !matches!(n, Notification::UpstreamError { .. }))
        {
            printer.notify(notification);
        }
        printer.finish();
    }
    Ok(())
}

fn confirm(yes: bool, action: &str) -> Result<(), HarnessError> {
    if yes {
        Ok(())
    } else {
        Err(HarnessError::Validation(format!(
            "refusing to {action} without --yes"
        )))
    }
}

fn report_bulk_delete(what: &str, deleted: bool) {
    info!(event = "cli.bulk_delete", what, deleted, "bulk delete finished");
    if deleted {
        println!("all {what} deleted");
    } else {
        println!("{what} were not deleted");
    }
}

fn status_label(agent: &Agent) -> &'static str {
    if agent.is_active() {
        "active"
    } else {
        "disabled"
    }
}

fn token_label(workflow: &WorkflowApp) -> &'static str {
    if workflow.has_app_token() {
        "token"
    } else {
        "no token"
    }
}

fn print_agent(agent: &Agent) {
    println!("id:          {}", agent.id);
    println!("name:        {}", agent.name);
    println!("description: {}", agent.description);
    let workflow = agent.base_app_id.as_deref().unwrap_or("-");
    println!("workflow:    {workflow}");
    println!("status:      {}", status_label(agent));
    let visibility = match &agent.access_control {
        None => "public",
        Some(ac) if ac.is_private() => "private",
        Some(_) => "restricted",
    };
    println!("access:      {visibility}");
    if let Some(kb) = &agent.params.knowledge_base {
        println!("datasets:    {}", kb.dataset_ids.join(", "));
        println!(
            "search:      {} (similarity {}, limit {}, rerank {})",
            kb.search_mode.as_str(),
            kb.similarity,
            kb.limit,
            kb.using_rerank
        );
    }
    if !agent.params.tags.is_empty() {
        let tags: Vec<&str> = agent.params.tags.iter().map(|t| t.name.as_str()).collect();
        println!("tags:        {}", tags.join(", "));
    }
    println!("updated:     {}", format_time(agent.updated_at_utc()));
}

fn print_workflow(workflow: &WorkflowApp) {
    let api_path = workflow.resolved_api_path();
    println!("id:          {}", workflow.id);
    println!("name:        {}", workflow.name);
    println!("description: {}", workflow.description);
    println!("api path:    {}", api_path.as_deref().unwrap_or("-"));
    println!("app token:   {}", token_label(workflow));
    println!("deleted:     {}", workflow.is_deleted);
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), HarnessError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| HarnessError::Protocol(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}
