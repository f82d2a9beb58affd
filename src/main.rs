use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use dropin_orchestrator::agent::{self, definitions, QueryOptions, RunOverrides};
use dropin_orchestrator::config::Config;
use dropin_orchestrator::providers::{create_provider, Provider};
use dropin_orchestrator::security::PermissionMode;
use dropin_orchestrator::skills::{parse_custom_skill, AnthropicSkill, SkillsRunner};
use dropin_orchestrator::{demos, validators, workflow};

#[derive(Parser)]
#[command(name = "dropin", about = "Drop-in multi-agent orchestrator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 查看 Agent 定义
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
    /// 用全部 Agent 生成计划（默认 3 轮）
    Plan {
        prompt: String,
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// 用全部 Agent 执行开发任务（默认 50 轮，trusted）
    Dev {
        prompt: String,
        #[arg(long)]
        max_turns: Option<usize>,
        #[arg(long)]
        permission_mode: Option<PermissionMode>,
    },
    /// 指定 Agent 的自定义查询
    Query {
        prompt: String,
        /// 可重复，如 --agent research --agent coder
        #[arg(short, long = "agent")]
        agents: Vec<String>,
        #[arg(long)]
        max_turns: Option<usize>,
        #[arg(long, default_value = "default")]
        permission_mode: PermissionMode,
    },
    /// Agent Skills
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },
    /// 本地运行校验器，输入为 JSON 文件或 stdin（-）
    Validate {
        #[command(subcommand)]
        target: ValidateTarget,
    },
    /// 六步完整开发流程
    Workflow,
    /// 运行示例
    Demo {
        #[command(subcommand)]
        which: DemoKind,
    },
    /// 交互式配置向导
    Setup,
    /// 初始化配置文件
    Init,
    /// 显示当前配置
    Config,
}

#[derive(Subcommand)]
enum AgentsAction {
    /// 列出全部 Agent
    List,
    /// 显示 Agent 定义 JSON，不带名称时输出全部
    Show { name: Option<String> },
}

#[derive(Subcommand)]
enum SkillsAction {
    /// 列出预置 skill
    List,
    /// 带 skills 执行一次查询，原样输出响应 JSON
    Run {
        /// 预置 skill id：pdf / xlsx / pptx / docx
        #[arg(value_delimiter = ',')]
        skills: Vec<String>,
        /// 自定义 skill，格式 id[@version]
        #[arg(long)]
        custom: Vec<String>,
        #[arg(short, long)]
        prompt: String,
    },
}

#[derive(Subcommand)]
enum ValidateTarget {
    Code { input: PathBuf },
    Schema { input: PathBuf },
}

#[derive(Subcommand)]
enum DemoKind {
    Sdk,
    Skills,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Agents { action } => run_agents(action),
        Commands::Plan { prompt, max_turns } => {
            let config = Config::load_or_init().wrap_err("failed to load config")?;
            let provider = provider_from(&config)?;
            let overrides = RunOverrides {
                max_turns,
                ..Default::default()
            };
            agent::run_plan(provider, &config, &prompt, overrides, &mut std::io::stdout()).await?;
        }
        Commands::Dev {
            prompt,
            max_turns,
            permission_mode,
        } => {
            let config = Config::load_or_init().wrap_err("failed to load config")?;
            let provider = provider_from(&config)?;
            let overrides = RunOverrides {
                max_turns,
                permission_mode,
                ..Default::default()
            };
            agent::run_dev(provider, &config, &prompt, overrides, &mut std::io::stdout()).await?;
        }
        Commands::Query {
            prompt,
            agents,
            max_turns,
            permission_mode,
        } => run_query(prompt, agents, max_turns, permission_mode).await?,
        Commands::Skills { action } => run_skills(action).await?,
        Commands::Validate { target } => run_validate(target)?,
        Commands::Workflow => run_workflow().await?,
        Commands::Demo { which } => run_demo(which).await?,
        Commands::Setup => dropin_orchestrator::config::run_setup()?,
        Commands::Init => run_init()?,
        Commands::Config => run_config()?,
    }

    Ok(())
}

/// API Key 缺失时直接报错退出
fn provider_from(config: &Config) -> Result<Arc<dyn Provider>> {
    let key = config.api_key().ok_or_else(|| {
        eyre!("ANTHROPIC_API_KEY is not set. Export it or run `dropin setup`.")
    })?;
    Ok(Arc::from(create_provider(config, key)))
}

fn run_agents(action: AgentsAction) {
    match action {
        AgentsAction::List => {
            for agent in definitions::all() {
                println!("{:<18} {}", agent.name, agent.definition.description);
            }
        }
        AgentsAction::Show { name } => {
            println!("{}", definitions::agent_info_json(name.as_deref()));
        }
    }
}

async fn run_query(
    prompt: String,
    agents: Vec<String>,
    max_turns: Option<usize>,
    permission_mode: PermissionMode,
) -> Result<()> {
    let config = Config::load_or_init().wrap_err("failed to load config")?;
    let provider = provider_from(&config)?;

    let selected = if agents.is_empty() {
        definitions::all().iter().collect()
    } else {
        definitions::select(&agents)?
    };
    let mut options = QueryOptions::from_config(&config)
        .agents(selected)
        .mcp_server(Arc::new(dropin_orchestrator::mcp::orchestrator_server()))
        .permission_mode(permission_mode);
    if let Some(max_turns) = max_turns {
        options = options.max_turns(max_turns);
    }
    if permission_mode.requires_confirmation() {
        options = options.confirm_fn(Box::new(confirm_tool));
    }

    agent::drain(provider, &prompt, options, &mut std::io::stdout()).await?;
    Ok(())
}

/// review-each-step 模式下逐个确认工具调用
fn confirm_tool(name: &str, input: &serde_json::Value) -> bool {
    eprintln!("\n🔧 {} {}", name, input);
    dialoguer::Confirm::new()
        .with_prompt("Allow this tool call?")
        .default(false)
        .interact()
        .unwrap_or(false)
}

async fn run_skills(action: SkillsAction) -> Result<()> {
    match action {
        SkillsAction::List => {
            for skill in AnthropicSkill::ALL {
                println!("{:<6} {:<12} {}", skill.id(), skill.label(), skill.description());
            }
        }
        SkillsAction::Run {
            skills,
            custom,
            prompt,
        } => {
            let mut selected = Vec::new();
            for id in &skills {
                let skill = AnthropicSkill::from_id(id).ok_or_else(|| {
                    eyre!("Unknown skill '{}'. Available: pdf, xlsx, pptx, docx", id)
                })?;
                selected.push(skill.skill());
            }
            selected.extend(custom.iter().map(|c| parse_custom_skill(c)));
            if selected.is_empty() {
                return Err(eyre!("No skills given. Pass skill ids or --custom <id[@version]>"));
            }

            let config = Config::load_or_init().wrap_err("failed to load config")?;
            let runner = SkillsRunner::from_config(&config)?;
            let response = runner.run(&prompt, selected).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

fn run_validate(target: ValidateTarget) -> Result<()> {
    let output = match target {
        ValidateTarget::Code { input } => validators::code::execute(&read_json(&input)?).to_value(),
        ValidateTarget::Schema { input } => {
            validators::schema::execute(&read_json(&input)?).to_value()
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_json(path: &PathBuf) -> Result<serde_json::Value> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).wrap_err("input is not valid JSON")
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

async fn run_workflow() -> Result<()> {
    let config = Config::load_or_init().wrap_err("failed to load config")?;
    let mut out = std::io::stdout();

    let Some(key) = config.api_key() else {
        demos::write_missing_key_notice(&mut out)?;
        workflow::write_simulated(&mut out)?;
        return Ok(());
    };
    let provider: Arc<dyn Provider> = Arc::from(create_provider(&config, key));
    let skills = SkillsRunner::from_config(&config)?;

    let report = workflow::Workflow::new(provider, skills, config)
        .run(&mut out)
        .await
        .wrap_err("❌ Workflow failed")?;
    tracing::info!(
        files = report.implemented_files.len(),
        validation = ?report.validation,
        "workflow report"
    );
    out.flush()?;
    Ok(())
}

async fn run_demo(which: DemoKind) -> Result<()> {
    let config = Config::load_or_init().wrap_err("failed to load config")?;
    let mut out = std::io::stdout();
    let Some(key) = config.api_key() else {
        demos::write_missing_key_notice(&mut out)?;
        return Ok(());
    };
    match which {
        DemoKind::Skills => demos::skills_demo(&mut out)?,
        DemoKind::Sdk => {
            let provider: Arc<dyn Provider> = Arc::from(create_provider(&config, key));
            demos::sdk_demo(provider, &config, &mut out)
                .await
                .wrap_err("❌ Error running examples")?;
        }
    }
    Ok(())
}

fn run_init() -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
        println!("Delete it first to re-initialize.");
    } else {
        let _ = Config::load_or_init()?;
        println!("Created config: {}", config_path.display());
        println!("Add your API key there or export ANTHROPIC_API_KEY.");
    }

    Ok(())
}

fn run_config() -> Result<()> {
    let config_path = Config::config_path()?;

    if !config_path.exists() {
        println!("No config file. Run `dropin init` to create one.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&config_path).wrap_err("failed to read config")?;
    println!("Config: {}\n", config_path.display());
    println!("{}", content);

    Ok(())
}

/// 日志目录: ~/.dropin/logs/
fn log_dir() -> Result<PathBuf> {
    Ok(Config::home_dir()?.join("logs"))
}

/// 初始化 tracing: stderr 只输出 warn+，日志文件输出 debug+
fn init_tracing() -> Result<()> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .wrap_err_with(|| format!("failed to create log dir: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "dropin.log");
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("dropin_orchestrator=debug,dropin=debug")
            }),
        );

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}
